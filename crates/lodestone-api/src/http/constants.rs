//! Shared HTTP constants (headers, problem URIs, keep-alive).

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
pub(crate) const HEADER_LAST_EVENT_ID: &str = "last-event-id";
pub(crate) const SSE_KEEP_ALIVE_SECS: u64 = 20;

pub(crate) const PROBLEM_INTERNAL: &str = "https://lodestone.dev/problems/internal";
pub(crate) const PROBLEM_BAD_REQUEST: &str = "https://lodestone.dev/problems/bad-request";
pub(crate) const PROBLEM_NOT_FOUND: &str = "https://lodestone.dev/problems/not-found";
pub(crate) const PROBLEM_CONFLICT: &str = "https://lodestone.dev/problems/conflict";
pub(crate) const PROBLEM_CAPACITY: &str = "https://lodestone.dev/problems/capacity-exceeded";

pub(crate) const MESSAGE_MAGNET_REQUIRED: &str = "Magnet link is required";
pub(crate) const MESSAGE_CAPACITY: &str = "Maximum concurrent downloads reached";
pub(crate) const MESSAGE_DOWNLOAD_NOT_FOUND: &str = "Download not found";
pub(crate) const MESSAGE_FILE_NOT_FOUND: &str = "File not found";
