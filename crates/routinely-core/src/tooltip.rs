//! Hover-delayed description tooltip.
//!
//! A tooltip appears once the pointer has rested on a card for
//! [`SHOW_DELAY`] and disappears [`HIDE_DELAY`] after the pointer leaves the
//! card, unless the pointer moved onto the tooltip in the meantime. All
//! transitions take the current time as an argument; deadlines are only
//! acted on by [`HoverTooltip::tick`].

use std::time::{Duration, Instant};

pub const SHOW_DELAY: Duration = Duration::from_millis(400);
pub const HIDE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TooltipState<T> {
    Hidden,
    PendingShow { target: T, deadline: Instant },
    Shown { target: T },
    PendingHide { target: T, deadline: Instant },
}

#[derive(Debug, Clone)]
pub struct HoverTooltip<T> {
    state: TooltipState<T>,
}

impl<T> Default for HoverTooltip<T> {
    fn default() -> Self {
        Self {
            state: TooltipState::Hidden,
        }
    }
}

impl<T: Clone + PartialEq> HoverTooltip<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &TooltipState<T> {
        &self.state
    }

    /// The target whose tooltip is currently on screen
    pub fn visible(&self) -> Option<&T> {
        match &self.state {
            TooltipState::Shown { target } | TooltipState::PendingHide { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn enter_card(&mut self, target: T, now: Instant) {
        self.state = match std::mem::replace(&mut self.state, TooltipState::Hidden) {
            // Coming back to the same card before the hide fired
            TooltipState::PendingHide { target: current, .. } | TooltipState::Shown { target: current }
                if current == target =>
            {
                TooltipState::Shown { target }
            }
            TooltipState::PendingShow { target: current, deadline } if current == target => {
                TooltipState::PendingShow { target, deadline }
            }
            _ => TooltipState::PendingShow {
                target,
                deadline: now + SHOW_DELAY,
            },
        };
    }

    pub fn leave_card(&mut self, now: Instant) {
        self.state = match std::mem::replace(&mut self.state, TooltipState::Hidden) {
            TooltipState::Shown { target } => TooltipState::PendingHide {
                target,
                deadline: now + HIDE_DELAY,
            },
            TooltipState::PendingHide { target, deadline } => TooltipState::PendingHide { target, deadline },
            TooltipState::PendingShow { .. } | TooltipState::Hidden => TooltipState::Hidden,
        };
    }

    pub fn enter_tooltip(&mut self) {
        if let TooltipState::PendingHide { target, .. } = &self.state {
            self.state = TooltipState::Shown {
                target: target.clone(),
            };
        }
    }

    pub fn leave_tooltip(&mut self) {
        if self.visible().is_some() {
            self.state = TooltipState::Hidden;
        }
    }

    pub fn hide(&mut self) {
        self.state = TooltipState::Hidden;
    }

    /// Fires any elapsed deadline. Returns true if visibility changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let next = match &self.state {
            TooltipState::PendingShow { target, deadline } if now >= *deadline => TooltipState::Shown {
                target: target.clone(),
            },
            TooltipState::PendingHide { deadline, .. } if now >= *deadline => TooltipState::Hidden,
            _ => return false,
        };
        self.state = next;
        true
    }
}
