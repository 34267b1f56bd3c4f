use std::io::{self, Write};
use std::time::Duration;

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode,
    enable_raw_mode,
};
use crossterm::{execute, queue};
use tokio::sync::oneshot;

const KEY_POLL: Duration = Duration::from_millis(100);

/// Puts the terminal in raw mode on the alternate screen and restores it on
/// drop, including on early return and panic.
pub struct Screen {
    stdout: io::Stdout,
}

impl Screen {
    pub fn enter() -> io::Result<Self> {
        enable_raw_mode()?;

        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen, Hide) {
            let _ = disable_raw_mode();
            return Err(e);
        }

        Ok(Self { stdout })
    }

    /// Replaces the screen contents with `frame`.
    pub fn draw(&mut self, frame: &str) -> io::Result<()> {
        queue!(self.stdout, Clear(ClearType::All), MoveTo(0, 0))?;

        // Raw mode does not translate line feeds.
        for line in frame.lines() {
            write!(self.stdout, "{line}\r\n")?;
        }

        self.stdout.flush()
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        if let Err(e) = execute!(self.stdout, Show, LeaveAlternateScreen) {
            error!("failed to leave alternate screen: {e}");
        }

        if let Err(e) = disable_raw_mode() {
            error!("failed to disable raw mode: {e}");
        }
    }
}

/// Whether `key` asks the dashboard to close. Raw mode swallows the
/// interrupt signal, so Ctrl+C arrives here as a key too.
pub fn is_quit(code: KeyCode, modifiers: KeyModifiers) -> bool {
    match code {
        KeyCode::Char('q' | 'Q') | KeyCode::Esc => true,
        KeyCode::Char('c') => modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Watches the keyboard on a blocking thread. The receiver resolves once a
/// quit key is pressed, or with the error that stopped event reading. The
/// thread exits soon after the receiver is dropped.
pub fn quit_keys() -> oneshot::Receiver<io::Result<()>> {
    let (tx, rx) = oneshot::channel();

    tokio::task::spawn_blocking(move || {
        let r = loop {
            if tx.is_closed() {
                return;
            }

            match event::poll(KEY_POLL) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(e) => break Err(e),
            }

            match event::read() {
                Ok(Event::Key(key))
                    if key.kind == KeyEventKind::Press && is_quit(key.code, key.modifiers) =>
                {
                    break Ok(());
                }
                Ok(_) => {}
                Err(e) => break Err(e),
            }
        };

        let _ = tx.send(r);
    });

    rx
}
