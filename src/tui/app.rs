//! Debugger application state and logic.

use crate::config::SimConfig;
use crate::cpu::{Cpu, Step, MEMORY_SIZE};
use crate::image::disasm::disassemble_word;
use std::collections::HashSet;

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// Original image for reset.
    pub image: Vec<u16>,
    /// Breakpoints (by address).
    pub breakpoints: HashSet<u16>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view scroll offset.
    pub mem_scroll: usize,
    config: SimConfig,
    resume_from: Option<u16>,
}

impl DebuggerApp {
    /// Create a new debugger with a loaded image.
    pub fn new(image: Vec<u16>, config: SimConfig) -> Self {
        let cpu = Self::boot(&image, &config);

        Self {
            cpu,
            image,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status: "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into(),
            mem_scroll: 0,
            config,
            resume_from: None,
        }
    }

    fn boot(image: &[u16], config: &SimConfig) -> Cpu {
        let mut cpu = Cpu::with_config(config);
        if let Err(e) = cpu.load_image(image) {
            tracing::warn!(error = %e, "debugger image did not fit");
        }
        cpu
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        let pc = self.cpu.regs.pc;
        let word = self.cpu.mem.fetch(pc).unwrap_or_default();

        match self.cpu.step() {
            Step::Continue(_) => {
                self.status = format!("PC={:04}: {}", pc, disassemble_word(word, pc));
            }
            Step::Halted => {
                self.status = format!("Halted at PC={} after {} cycles", self.cpu.regs.pc, self.cpu.cycles);
                self.running = false;
            }
            Step::Faulted(e) => {
                self.status = format!("Fault: {}", e);
                self.running = false;
            }
        }
    }

    /// Run until halt, breakpoint, or fault.
    pub fn run(&mut self) {
        self.running = true;
        self.resume_from = Some(self.cpu.regs.pc);
        self.status = "Running...".into();
    }

    /// Pause continuous execution.
    pub fn pause(&mut self) {
        self.running = false;
        self.status = "Paused.".into();
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        if !self.cpu.is_running() {
            self.running = false;
            self.status = format!("Stopped after {} cycles ({:?})", self.cpu.cycles, self.cpu.state);
            return;
        }

        if let Some(limit) = self.config.max_cycles {
            if self.cpu.cycles >= limit {
                self.running = false;
                self.status = format!("Cycle limit {} reached", limit);
                return;
            }
        }

        // A breakpoint does not fire on the address execution resumed from
        let pc = self.cpu.regs.pc;
        if self.breakpoints.contains(&pc) && self.resume_from.take() != Some(pc) {
            self.running = false;
            self.status = format!("Breakpoint at PC={}", pc);
            return;
        }
        self.resume_from = None;

        self.step();
    }

    /// Toggle breakpoint at current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.cpu.regs.pc;
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC={}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC={}", pc);
        }
    }

    /// Reset CPU to initial state.
    pub fn reset(&mut self) {
        self.cpu = Self::boot(&self.image, &self.config);
        self.running = false;
        self.status = "Reset. Ready.".into();
    }

    /// Scroll the memory view up one row.
    pub fn scroll_up(&mut self) {
        self.mem_scroll = self.mem_scroll.saturating_sub(1);
    }

    /// Scroll the memory view down one row.
    pub fn scroll_down(&mut self) {
        if self.mem_scroll + 1 < MEMORY_SIZE {
            self.mem_scroll += 1;
        }
    }

    /// Get disassembly around current PC.
    pub fn get_disassembly(&self, lines: usize) -> Vec<(u16, String, bool)> {
        let pc = usize::from(self.cpu.regs.pc);
        let start = pc.saturating_sub(lines / 2);
        let end = (start + lines).min(MEMORY_SIZE);

        self.cpu
            .mem
            .dump(start, end - start)
            .into_iter()
            .map(|(addr, word)| {
                let addr = addr as u16;
                (addr, disassemble_word(word, addr), usize::from(addr) == pc)
            })
            .collect()
    }
}

/// Run the debugger with an image.
pub fn run_debugger(image: Vec<u16>, config: SimConfig) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = DebuggerApp::new(image, config);

    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        let timeout = if app.running { Duration::ZERO } else { Duration::from_millis(50) };
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => app.pause(),
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Up => app.scroll_up(),
                        KeyCode::Down => app.scroll_down(),
                        _ => {}
                    }
                }
            }
        }

        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
