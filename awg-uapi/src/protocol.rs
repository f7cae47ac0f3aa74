//! Control-channel transaction framing
//!
//! A configuration transaction is `set=1\n`, the stream lines, and a blank
//! line. The engine answers with `key=value` lines terminated by a blank line,
//! one of which is `errno=<n>`.

use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::stream::ControlStream;

/// Frame a stream as a `set` transaction
pub fn set_request(stream: &ControlStream) -> Zeroizing<String> {
    let mut request = Zeroizing::new(String::with_capacity(stream.as_str().len() + 8));
    request.push_str("set=1\n");
    request.push_str(stream.as_str());
    request.push('\n');
    request
}

/// Interpret an engine reply.
///
/// Returns `Ok(())` for `errno=0`, [`Error::Rejected`] for any other errno.
pub fn parse_reply(reply: &str) -> Result<()> {
    for line in reply.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            break;
        }
        if let Some(value) = line.strip_prefix("errno=") {
            let errno: i64 = value
                .trim()
                .parse()
                .map_err(|_| Error::MalformedReply(format!("bad errno value {:?}", value)))?;
            return if errno == 0 {
                Ok(())
            } else {
                Err(Error::Rejected(errno))
            };
        }
    }
    Err(Error::MalformedReply("reply carries no errno".into()))
}

/// True once `reply` holds a complete response (terminated by a blank line)
pub fn reply_complete(reply: &str) -> bool {
    reply.starts_with('\n') || reply.contains("\n\n")
}
