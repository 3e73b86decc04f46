//! Audience selections from standard input
//!
//! One selection per line. Unparseable lines are logged and skipped; end of
//! input closes the audience.

use std::io::BufRead;
use std::thread::{self, JoinHandle};

use playcast_core::Selection;
use playcast_core::audience::ChannelAudience;

/// Channel capacity between the reader thread and the driver
const SELECTION_BUFFER: usize = 16;

/// Start a reader thread feeding an audience from `input`
pub fn spawn_reader<R>(input: R) -> (ChannelAudience, JoinHandle<()>)
where
    R: BufRead + Send + 'static,
{
    let (tx, audience) = ChannelAudience::new(SELECTION_BUFFER);

    let handle = thread::spawn(move || {
        for line in input.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::error!("Failed to read selection: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<Selection>() {
                Ok(selection) => {
                    if tx.blocking_send(selection).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!("Ignoring selection: {}", e),
            }
        }
        tracing::debug!("Selection input closed");
    });

    (audience, handle)
}
