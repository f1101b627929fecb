use clap::ValueEnum;

use crate::types::PlayerState;

/// What the HUD shows after a win.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, ValueEnum)]
pub enum WinBannerPolicy {
    /// The banner stays until the game is reset.
    #[default]
    Sticky,
    /// The banner replaces the status for the winning action only.
    Transient,
}

#[derive(Clone, Debug)]
pub struct HudState {
    policy: WinBannerPolicy,
    won_value: Option<u32>,
    banner_pending: bool,
}

impl HudState {
    pub fn new(policy: WinBannerPolicy, won_value: Option<u32>) -> Self {
        Self {
            policy,
            won_value,
            banner_pending: false,
        }
    }

    pub fn won_value(&self) -> Option<u32> {
        self.won_value
    }

    pub fn record_win(&mut self, value: u32) {
        self.won_value = Some(self.won_value.map_or(value, |best| best.max(value)));
        self.banner_pending = true;
    }

    pub fn clear(&mut self) {
        self.won_value = None;
        self.banner_pending = false;
    }

    pub fn render(&mut self, player: &PlayerState) -> String {
        let show_banner = match self.policy {
            WinBannerPolicy::Sticky => self.won_value.is_some(),
            WinBannerPolicy::Transient => self.banner_pending,
        };
        self.banner_pending = false;
        match (show_banner, self.won_value) {
            (true, Some(value)) => win_banner(value),
            _ => status_line(player),
        }
    }
}

pub fn win_banner(value: u32) -> String {
    format!("You crafted {value}! You win!")
}

pub fn status_line(player: &PlayerState) -> String {
    let held = match player.held {
        Some(value) => value.to_string(),
        None => "(empty)".to_string(),
    };
    format!(
        "Position: ({}, {}) | Held: {held}",
        player.position.i, player.position.j
    )
}
