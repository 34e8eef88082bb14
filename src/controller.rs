use std::time::Duration;
use tracing::trace;

use crate::domain::{Message, SRConfig, SRError};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &SRConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, SRError> {
        if !event::poll(Duration::from_millis(self.event_poll_time))? {
            return Ok(None);
        }
        let message = match event::read()? {
            Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                if model.raw_keyevents() {
                    Some(Message::RawKey(key))
                } else {
                    self.handle_key(key)
                }
            }
            Event::Resize(width, height) => Some(Message::Resize(width as usize, height as usize)),
            _ => None,
        };
        Ok(message)
    }

    pub fn handle_key(&self, key: KeyEvent) -> Option<Message> {
        let message = match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Char('j') | KeyCode::Down => Some(Message::MoveDown),
            KeyCode::Char('k') | KeyCode::Up => Some(Message::MoveUp),
            KeyCode::Home => Some(Message::MoveBeginning),
            KeyCode::End => Some(Message::MoveEnd),
            KeyCode::Char(' ') | KeyCode::Enter => Some(Message::ToggleColumn),
            KeyCode::Char('a') => Some(Message::SelectAll),
            KeyCode::Char('c') => Some(Message::ClearSelection),
            KeyCode::Char('g') => Some(Message::GenerateGraphs),
            KeyCode::Char('s') => Some(Message::GenerateStats),
            KeyCode::Char('G') => Some(Message::DownloadGraphs),
            KeyCode::Char('S') => Some(Message::DownloadStats),
            KeyCode::Char('o') => Some(Message::OpenFile),
            KeyCode::Char('?') => Some(Message::Help),
            KeyCode::Esc => Some(Message::Exit),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}
