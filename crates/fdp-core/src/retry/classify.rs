//! Map transport failures onto [`ErrorKind`].

use super::policy::ErrorKind;

/// Non-2xx status of an HTTP answer.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code as u16),
        _ => ErrorKind::Other,
    }
}

/// curl failure of a whole request. Aborts we caused ourselves (short writes)
/// and malformed URLs are not transient.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    let unreachable = e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_read_error()
        || e.is_got_nothing();
    if e.is_operation_timedout() {
        ErrorKind::Timeout
    } else if unreachable {
        ErrorKind::Connection
    } else {
        ErrorKind::Other
    }
}
