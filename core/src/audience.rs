//! The audience: whoever watches the animations and picks the next input

use anyhow::Result;
use tokio::sync::mpsc;

use crate::encode::Animation;
use crate::input::Selection;

/// Publishes animations and collects input selections
pub trait Audience {
    /// Show a finished animation
    fn publish(&mut self, animation: &Animation) -> Result<()>;

    /// Block until the next selection arrives.
    ///
    /// Returns `Ok(None)` once the audience has gone away for good.
    fn next_selection(&mut self) -> Result<Option<Selection>>;
}

/// Audience fed through a channel.
///
/// Selections come from any thread holding the sender returned by
/// [`ChannelAudience::new`]. Published animations are forwarded to an
/// optional listener.
pub struct ChannelAudience {
    selections: mpsc::Receiver<Selection>,
    published: Option<mpsc::UnboundedSender<Animation>>,
}

impl ChannelAudience {
    /// Create an audience and the sender that feeds it
    pub fn new(buffer: usize) -> (mpsc::Sender<Selection>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (
            tx,
            Self {
                selections: rx,
                published: None,
            },
        )
    }

    /// Forward every published animation to the returned receiver
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Animation> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.published = Some(tx);
        rx
    }
}

impl Audience for ChannelAudience {
    fn publish(&mut self, animation: &Animation) -> Result<()> {
        tracing::info!(
            "Published {} ({} frames, {:.2}s)",
            animation.path.display(),
            animation.frame_count,
            animation.duration.as_secs_f64()
        );
        if let Some(tx) = &self.published
            && tx.send(animation.clone()).is_err()
        {
            // Listener went away; keep publishing to the log only
            self.published = None;
        }
        Ok(())
    }

    fn next_selection(&mut self) -> Result<Option<Selection>> {
        Ok(self.selections.blocking_recv())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Button;
    use std::path::PathBuf;
    use std::time::Duration;

    fn animation() -> Animation {
        Animation {
            path: PathBuf::from("out/cycle.gif"),
            frame_count: 3,
            duration: Duration::from_secs(1),
        }
    }

    #[test]
    fn selections_arrive_in_order_then_close() {
        let (tx, mut audience) = ChannelAudience::new(4);
        std::thread::spawn(move || {
            tx.blocking_send(Selection::Multiplier(3)).unwrap();
            tx.blocking_send(Selection::Press(Button::Start)).unwrap();
        });

        assert_eq!(
            audience.next_selection().unwrap(),
            Some(Selection::Multiplier(3))
        );
        assert_eq!(
            audience.next_selection().unwrap(),
            Some(Selection::Press(Button::Start))
        );
        assert_eq!(audience.next_selection().unwrap(), None);
    }

    #[test]
    fn published_animations_reach_subscriber() {
        let (_tx, mut audience) = ChannelAudience::new(1);
        let mut rx = audience.subscribe();

        audience.publish(&animation()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), animation());

        drop(rx);
        audience.publish(&animation()).unwrap();
    }
}
