//! Transport close codes.
//!
//! The close code is the only signal the session uses to decide whether a
//! disconnect was intentional. [`NORMAL`] means "someone asked for this" and
//! suppresses reconnection; every other code is treated as abnormal.

/// Intentional close requested by either side.
pub const NORMAL: u16 = 1000;

/// Endpoint is going away (server shutdown, page navigation).
pub const GOING_AWAY: u16 = 1001;

/// Close frame carried no status code.
pub const NO_STATUS: u16 = 1005;

/// Connection dropped without a close handshake.
///
/// Never sent on the wire; drivers synthesize it when the stream ends or the
/// transport errors out without a close frame.
pub const ABNORMAL: u16 = 1006;

/// Returns true if `code` signals an intentional close.
pub fn is_normal(code: u16) -> bool {
    code == NORMAL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_normal_closure_is_intentional() {
        assert!(is_normal(NORMAL));
        assert!(!is_normal(GOING_AWAY));
        assert!(!is_normal(NO_STATUS));
        assert!(!is_normal(ABNORMAL));
        assert!(!is_normal(4000));
    }
}
