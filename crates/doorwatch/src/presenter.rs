//! Terminal rendering of alerts.
//!
//! Prints each alert to stdout and forwards it to the lifecycle
//! controller, which owns the auto-hide / fade timing. A separate watch
//! task mirrors the controller's state transitions onto the terminal so
//! the "notification window" visibly appears and disappears.

use doorwatch_core::{AlertHandle, AlertRequest, AlertState, Presenter};

const RULE_WIDTH: usize = 60;

pub struct TerminalPresenter {
    handle: AlertHandle,
}

impl TerminalPresenter {
    pub fn new(handle: AlertHandle) -> Self {
        Self { handle }
    }
}

impl Presenter for TerminalPresenter {
    fn display(&mut self, alert: &AlertRequest) {
        let rule = "─".repeat(RULE_WIDTH);
        println!("┌{rule}┐");
        println!("  {}", alert.title);
        println!("  {}", alert.body);
        println!("└{rule}┘");
        self.handle.display(alert);
    }
}

/// Mirror controller state onto the terminal until the controller stops.
pub async fn watch_surface(handle: AlertHandle) {
    let mut state_rx = handle.watch_state();
    while state_rx.changed().await.is_ok() {
        match *state_rx.borrow() {
            AlertState::FadingOut => println!("  (alert fading)"),
            AlertState::Hidden => println!("  (alert dismissed)"),
            AlertState::Showing => {}
        }
    }
}
