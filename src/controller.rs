use std::time::Duration;
use tracing::trace;

use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};

use crate::domain::{Message, TMConfig, TMError};
use crate::model::{Model, Modus};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &TMConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, TMError> {
        if !event::poll(Duration::from_millis(self.event_poll_time))? {
            return Ok(None);
        }
        let message = match event::read()? {
            Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                self.handle_key(key, model)
            }
            Event::Resize(width, height) => Some(Message::Resize(width.into(), height.into())),
            _ => None,
        };
        Ok(message)
    }

    fn handle_key(&self, key: KeyEvent, model: &Model) -> Option<Message> {
        let message = if model.raw_keyevents() {
            Some(Message::RawKey(key))
        } else {
            map_key(key, model.modus())
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

fn map_key(key: KeyEvent, modus: Modus) -> Option<Message> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(Message::Quit),
            _ => None,
        };
    }
    match modus {
        Modus::TABLE => table_key(key.code),
        Modus::EDIT => edit_key(key.code),
        Modus::COLUMNS => columns_key(key.code),
        Modus::POPUP => match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char(' ') => Some(Message::Exit),
            KeyCode::Up | KeyCode::Char('k') => Some(Message::MoveUp),
            KeyCode::Down | KeyCode::Char('j') => Some(Message::MoveDown),
            _ => None,
        },
        Modus::CMDINPUT => Some(Message::RawKey(key)),
    }
}

fn table_key(code: KeyCode) -> Option<Message> {
    match code {
        KeyCode::Char('q') => Some(Message::Quit),
        KeyCode::Up | KeyCode::Char('k') => Some(Message::MoveUp),
        KeyCode::Down | KeyCode::Char('j') => Some(Message::MoveDown),
        KeyCode::Left | KeyCode::Char('h') => Some(Message::MoveLeft),
        KeyCode::Right | KeyCode::Char('l') => Some(Message::MoveRight),
        KeyCode::PageDown | KeyCode::Char('n') => Some(Message::NextPage),
        KeyCode::PageUp | KeyCode::Char('p') => Some(Message::PrevPage),
        KeyCode::Home | KeyCode::Char('g') => Some(Message::FirstPage),
        KeyCode::End | KeyCode::Char('G') => Some(Message::LastPage),
        KeyCode::Char('+') => Some(Message::CyclePageSize),
        KeyCode::Char('/') => Some(Message::Search),
        KeyCode::Backspace => Some(Message::ClearSearch),
        KeyCode::Char('s') => Some(Message::Sort),
        KeyCode::Char('e') | KeyCode::Enter => Some(Message::EditRow),
        KeyCode::Char('a') => Some(Message::AddRow),
        KeyCode::Char('d') | KeyCode::Delete => Some(Message::DeleteRow),
        KeyCode::Char('c') => Some(Message::ManageColumns),
        KeyCode::Char('i') => Some(Message::Import),
        KeyCode::Char('x') => Some(Message::Export),
        KeyCode::Char('t') => Some(Message::Template),
        KeyCode::Char('R') => Some(Message::Reset),
        KeyCode::Char('T') => Some(Message::ToggleTheme),
        KeyCode::Char('y') => Some(Message::CopyCell),
        KeyCode::Char('Y') => Some(Message::CopyRow),
        KeyCode::Char('?') => Some(Message::Help),
        KeyCode::Esc => Some(Message::Exit),
        _ => None,
    }
}

fn edit_key(code: KeyCode) -> Option<Message> {
    match code {
        KeyCode::Left | KeyCode::Char('h') | KeyCode::BackTab => Some(Message::MoveLeft),
        KeyCode::Right | KeyCode::Char('l') | KeyCode::Tab => Some(Message::MoveRight),
        KeyCode::Enter => Some(Message::Enter),
        KeyCode::Char('w') => Some(Message::SaveRow),
        KeyCode::Esc => Some(Message::Exit),
        KeyCode::Char('?') => Some(Message::Help),
        _ => None,
    }
}

fn columns_key(code: KeyCode) -> Option<Message> {
    match code {
        KeyCode::Up | KeyCode::Char('k') => Some(Message::MoveUp),
        KeyCode::Down | KeyCode::Char('j') => Some(Message::MoveDown),
        KeyCode::Char(' ') | KeyCode::Enter => Some(Message::ToggleColumn),
        KeyCode::Char('K') => Some(Message::MoveColumnUp),
        KeyCode::Char('J') => Some(Message::MoveColumnDown),
        KeyCode::Char('n') => Some(Message::AddColumn),
        KeyCode::Esc | KeyCode::Char('c') => Some(Message::Exit),
        KeyCode::Char('?') => Some(Message::Help),
        _ => None,
    }
}
