use colored::Colorize;

use oracle_bci::{ControlMode, ControlSnapshot, Direction, PipelineStats};

/// Items shown when no custom list is given.
pub const DEFAULT_ITEMS: [&str; 5] = ["Browser", "Music", "Messages", "Camera", "Settings"];

/// What a frame did to the carousel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CarouselEvent {
    Moved { index: usize, direction: Direction },
    Opened(usize),
    Closed(usize),
}

/// Text carousel driven by control frames.
#[derive(Debug)]
pub struct Carousel {
    items: Vec<String>,
    selected: usize,
    open: Option<usize>,
    /// Motion direction seen on the previous frame; motion input moves the
    /// selection once per tilt rather than once per frame.
    last_motion: Option<Direction>,
}

impl Carousel {
    pub fn new(items: Vec<String>) -> Self {
        Self {
            items,
            selected: 0,
            open: None,
            last_motion: None,
        }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn item(&self, index: usize) -> &str {
        self.items.get(index).map_or("", String::as_str)
    }

    /// Apply one frame. Cancel closes the open item before anything else;
    /// confirm opens the selection; a direction rotates it.
    pub fn apply(&mut self, frame: &ControlSnapshot, mode: ControlMode) -> Vec<CarouselEvent> {
        let mut events = Vec::new();
        if self.items.is_empty() {
            return events;
        }

        if frame.cancel_pending {
            if let Some(index) = self.open.take() {
                events.push(CarouselEvent::Closed(index));
            }
        } else if frame.confirm_pending && self.open.is_none() {
            self.open = Some(self.selected);
            events.push(CarouselEvent::Opened(self.selected));
        }

        let direction = match mode {
            ControlMode::Classifier => frame.direction,
            ControlMode::Motion => {
                let fresh = frame.direction.filter(|d| self.last_motion != Some(*d));
                self.last_motion = frame.direction;
                fresh
            }
        };
        if let (Some(direction), None) = (direction, self.open) {
            let len = self.items.len();
            self.selected = match direction {
                Direction::Left => (self.selected + len - 1) % len,
                Direction::Right => (self.selected + 1) % len,
            };
            events.push(CarouselEvent::Moved {
                index: self.selected,
                direction,
            });
        }

        events
    }

    /// One-line rendering with the selection highlighted.
    pub fn render(&self) -> String {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                if i == self.selected {
                    format!("[{}]", item.bold().cyan())
                } else {
                    format!(" {} ", item.dimmed())
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for Carousel {
    fn default() -> Self {
        Self::new(DEFAULT_ITEMS.iter().map(ToString::to_string).collect())
    }
}

pub fn format_event(carousel: &Carousel, event: &CarouselEvent, frame: &ControlSnapshot) -> String {
    match event {
        CarouselEvent::Moved { direction, .. } => {
            let confidence = frame
                .confidence
                .map(|c| format!(" ({:.0}%)", c * 100.0))
                .unwrap_or_default();
            format!("{} {direction}{confidence}  {}", "◀▶".blue(), carousel.render())
        }
        CarouselEvent::Opened(index) => {
            format!("{} {}", "Opened".green(), carousel.item(*index).bold())
        }
        CarouselEvent::Closed(index) => {
            format!("{} {}", "Closed".yellow(), carousel.item(*index).bold())
        }
    }
}

pub fn format_stats(stats: &PipelineStats) -> String {
    let ingest = &stats.ingest;
    format!(
        "Packets: {} (malformed {}, unrouted {}) | Samples: {} (dropped {}) | Windows: {} | Predictions: {}/{} | Worker: {}",
        ingest.packets,
        ingest.malformed,
        ingest.unrouted,
        ingest.samples,
        ingest.samples_dropped,
        ingest.windows_dispatched,
        stats.predictions_delivered,
        stats.predictions_produced,
        stats.worker,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(direction: Option<Direction>) -> ControlSnapshot {
        ControlSnapshot {
            direction,
            ..ControlSnapshot::default()
        }
    }

    #[test]
    fn test_directions_wrap_around() {
        let mut carousel = Carousel::default();
        carousel.apply(&frame(Some(Direction::Left)), ControlMode::Classifier);
        assert_eq!(carousel.selected(), DEFAULT_ITEMS.len() - 1);
        carousel.apply(&frame(Some(Direction::Right)), ControlMode::Classifier);
        assert_eq!(carousel.selected(), 0);
    }

    #[test]
    fn test_motion_moves_once_per_tilt() {
        let mut carousel = Carousel::default();
        for _ in 0..10 {
            carousel.apply(&frame(Some(Direction::Right)), ControlMode::Motion);
        }
        assert_eq!(carousel.selected(), 1);
        carousel.apply(&frame(None), ControlMode::Motion);
        carousel.apply(&frame(Some(Direction::Right)), ControlMode::Motion);
        assert_eq!(carousel.selected(), 2);
    }

    #[test]
    fn test_confirm_opens_and_cancel_closes() {
        let mut carousel = Carousel::default();
        let confirm = ControlSnapshot {
            confirm_pending: true,
            ..ControlSnapshot::default()
        };
        assert_eq!(
            carousel.apply(&confirm, ControlMode::Classifier),
            vec![CarouselEvent::Opened(0)]
        );

        // Directions are ignored while an item is open.
        assert!(carousel
            .apply(&frame(Some(Direction::Right)), ControlMode::Classifier)
            .is_empty());

        let cancel = ControlSnapshot {
            cancel_pending: true,
            ..ControlSnapshot::default()
        };
        assert_eq!(
            carousel.apply(&cancel, ControlMode::Classifier),
            vec![CarouselEvent::Closed(0)]
        );
    }
}
