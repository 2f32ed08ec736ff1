use crate::config::{AppConfig, KeyBindings};
use anyhow::{Context, Result};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute, queue,
    style::Print,
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use iat_core::{ResponseSide, SessionPhase};
use iat_experiment::{
    BlockPlan, ExperimentError, ExperimentEvent, ExperimentStateMachine, StimulusCatalog, TrialToken,
};
use iat_store::JsonDirStore;
use iat_timing::HighPrecisionTimer;
use rand::rngs::ThreadRng;
use std::io::{Stdout, Write, stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const MAX_POLL: Duration = Duration::from_millis(250);

type Engine = ExperimentStateMachine<HighPrecisionTimer, ThreadRng, JsonDirStore>;

/// Restores the terminal however the run ends.
struct TerminalGuard;

impl TerminalGuard {
    fn enter(out: &mut Stdout) -> Result<Self> {
        terminal::enable_raw_mode().context("enabling raw mode")?;
        execute!(out, EnterAlternateScreen, Hide)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(stdout(), Show, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

/// Terminal presenter: draws the engine's current view and maps keys to events.
pub struct App {
    experiment: Engine,
    keys: KeyBindings,
    participant: String,
    data_dir: PathBuf,
    /// Token of the stimulus currently on screen; responses are bound to it.
    displayed: Option<TrialToken>,
    status: Option<String>,
    should_exit: bool,
}

impl App {
    pub fn new(config: &AppConfig, participant: String) -> Result<Self> {
        let store = JsonDirStore::open(config.sessions_dir()).context("opening session store")?;
        let experiment = ExperimentStateMachine::new(
            config.experiment.clone(),
            Arc::new(StimulusCatalog::standard()),
            Arc::new(BlockPlan::standard()),
            HighPrecisionTimer::new(),
            rand::rng(),
            store,
        )
        .context("block plan does not fit the stimulus catalog")?;

        Ok(Self {
            experiment,
            keys: config.keys.clone(),
            participant,
            data_dir: config.data_dir(),
            displayed: None,
            status: None,
            should_exit: false,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let mut out = stdout();
        let outcome = self.send(ExperimentEvent::StartSession {
            participant: self.participant.clone(),
        });
        if self.experiment.phase() == SessionPhase::Idle {
            anyhow::bail!("could not start a session for {:?} ({outcome:?})", self.participant);
        }

        {
            let _guard = TerminalGuard::enter(&mut out)?;
            while !self.should_exit {
                self.experiment.update();
                if self.experiment.phase() == SessionPhase::Idle {
                    break;
                }
                self.draw(&mut out)?;

                let timeout = self
                    .experiment
                    .next_deadline()
                    .map_or(MAX_POLL, |d| d.min(MAX_POLL));
                if event::poll(timeout)? {
                    if let Event::Key(key) = event::read()? {
                        if key.kind == KeyEventKind::Press {
                            self.handle_key(key);
                        }
                    }
                }
            }
        }

        self.finish()
    }

    fn send(&mut self, event: ExperimentEvent) -> Option<iat_experiment::EventOutcome> {
        match self.experiment.handle_event(event) {
            Ok(outcome) => Some(outcome),
            Err(err @ ExperimentError::Persistence { .. }) => {
                self.status = Some(format!("{err}. 按 R 键重试保存"));
                None
            }
            Err(err) => {
                tracing::error!(%err, "engine rejected event");
                self.status = Some(err.to_string());
                None
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        let phase = self.experiment.phase();
        let event = match key.code {
            KeyCode::Esc => Some(ExperimentEvent::Abort),
            KeyCode::Char(c) if c.eq_ignore_ascii_case(&self.keys.left) => self.response(ResponseSide::Left),
            KeyCode::Char(c) if c.eq_ignore_ascii_case(&self.keys.right) => self.response(ResponseSide::Right),
            KeyCode::Char('r' | 'R') if phase == SessionPhase::Complete => {
                match self.experiment.retry_persist() {
                    Ok(_) => self.status = None,
                    Err(err) => self.status = Some(format!("{err}. 按 R 键重试保存")),
                }
                None
            }
            KeyCode::Char(' ') | KeyCode::Enter => match phase {
                SessionPhase::Instruction => Some(ExperimentEvent::Acknowledge),
                SessionPhase::BlockInstruction => Some(ExperimentEvent::StartBlock),
                SessionPhase::BlockEnd => Some(ExperimentEvent::Advance),
                SessionPhase::Complete => Some(ExperimentEvent::Return),
                _ => None,
            },
            _ => None,
        };

        if let Some(event) = event {
            self.send(event);
        }
        if phase == SessionPhase::Complete && key.code == KeyCode::Esc {
            self.should_exit = true;
        }
    }

    fn response(&self, side: ResponseSide) -> Option<ExperimentEvent> {
        self.displayed
            .map(|token| ExperimentEvent::Respond { side, token })
    }

    fn draw(&mut self, out: &mut Stdout) -> Result<()> {
        let (width, height) = terminal::size().unwrap_or((80, 24));
        let mid = height / 2;
        queue!(out, Clear(ClearType::All))?;

        self.displayed = None;
        let catalog = self.experiment.catalog();
        let labels = |categories: &[iat_core::Category]| {
            categories
                .iter()
                .map(|c| catalog.label(*c))
                .collect::<Vec<_>>()
                .join(" / ")
        };

        match self.experiment.phase() {
            SessionPhase::Instruction => {
                let lines = [
                    "内隐联想测验 (IAT)".to_string(),
                    String::new(),
                    "本实验需要您对屏幕中央出现的词汇进行快速分类。".to_string(),
                    format!(
                        "{} 键代表左侧类别，{} 键代表右侧类别。",
                        self.keys.left.to_ascii_uppercase(),
                        self.keys.right.to_ascii_uppercase()
                    ),
                    "请尽可能快速且准确地做出反应。".to_string(),
                    "如果分类错误，会出现 ✗ 提示，请按正确的键继续。".to_string(),
                    format!("实验共有 {} 个阶段，每个阶段开始前会有具体说明。", self.experiment.plan().len()),
                    String::new(),
                    "按空格键开始实验".to_string(),
                ];
                for (i, line) in lines.iter().enumerate() {
                    centered(out, width, 2 + i as u16, line)?;
                }
            }
            SessionPhase::BlockInstruction => {
                if let Some(block) = self.experiment.current_block() {
                    let tag = if block.is_practice { "练习阶段" } else { "正式测试" };
                    centered(out, width, 2, &format!("{} [{tag}]", block.name))?;
                    if block.is_reversed {
                        centered(out, width, 4, "注意：类别位置已经改变！")?;
                    }
                    centered(out, width, 6, &block.instruction)?;
                    centered(
                        out,
                        width,
                        8,
                        &format!(
                            "按 {} 键: {}    |    按 {} 键: {}",
                            self.keys.left.to_ascii_uppercase(),
                            labels(&block.left),
                            self.keys.right.to_ascii_uppercase(),
                            labels(&block.right)
                        ),
                    )?;
                    centered(out, width, 10, &format!("共 {} 个试次", block.trial_count))?;
                    centered(out, width, 12, "准备好了，按空格键开始")?;
                }
            }
            SessionPhase::Fixation => centered(out, width, mid, "+")?,
            SessionPhase::Trial => {
                if let (Some(block), Some(view)) =
                    (self.experiment.current_block(), self.experiment.current_stimulus())
                {
                    queue!(out, MoveTo(1, 1), Print(labels(&block.left)))?;
                    let right = labels(&block.right);
                    let right_col = width.saturating_sub(right.chars().count() as u16 * 2 + 1);
                    queue!(out, MoveTo(right_col, 1), Print(right))?;
                    centered(out, width, 0, &format!("{} / {}", view.sequence_index, view.total))?;
                    centered(out, width, mid, view.word)?;
                    if view.show_error {
                        centered(out, width, mid + 2, "✗  请按正确的键继续")?;
                    }
                    self.displayed = Some(view.token);
                }
            }
            SessionPhase::BlockEnd => {
                if let (Some(block), Some(stats), Some((n, total))) = (
                    self.experiment.current_block(),
                    self.experiment.block_statistics(),
                    self.experiment.block_progress(),
                ) {
                    centered(out, width, 2, &format!("{} 完成", block.name))?;
                    centered(out, width, 3, &format!("{n} / {total} 阶段"))?;
                    centered(
                        out,
                        width,
                        5,
                        &format!(
                            "正确率 {:.1}%    平均反应时 {:.0} ms",
                            stats.accuracy_percent, stats.mean_latency_ms
                        ),
                    )?;
                    let next = if n >= total { "查看结果" } else { "继续下一阶段" };
                    centered(out, width, 7, &format!("按空格键{next}"))?;
                }
            }
            SessionPhase::Complete => {
                centered(out, width, 2, "实验完成，感谢您的参与！")?;
                if let Some(summary) = self.experiment.session_summary() {
                    let rows = [
                        format!("相容阶段平均反应时    {:.0} ms", summary.compatible.mean_latency_ms),
                        format!("相容阶段正确率        {:.1}%", summary.compatible.accuracy_percent),
                        format!("不相容阶段平均反应时  {:.0} ms", summary.incompatible.mean_latency_ms),
                        format!("不相容阶段正确率      {:.1}%", summary.incompatible.accuracy_percent),
                        format!("IAT 效应              {:.0} ms", summary.iat_effect_ms),
                        format!("总试次数              {}", summary.total_trials),
                    ];
                    for (i, row) in rows.iter().enumerate() {
                        centered(out, width, 4 + i as u16, row)?;
                    }
                }
                centered(out, width, 11, "按空格键结束")?;
            }
            SessionPhase::Idle => {}
        }

        if let Some(status) = &self.status {
            queue!(out, MoveTo(0, height.saturating_sub(1)), Print(status))?;
        }
        out.flush()?;
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        if self.experiment.is_persisted() {
            if let Some(record) = self.experiment.sealed_record() {
                let path = self.experiment.persistence().path_for(&record.session_id);
                println!("Session {} saved to {}", record.session_id, path.display());
            }
            return Ok(());
        }

        let Some(record) = self.experiment.take_unpersisted() else {
            println!("Session aborted; nothing was saved.");
            return Ok(());
        };
        let fallback = self.data_dir.join(format!("{}.csv", record.session_id));
        std::fs::create_dir_all(&self.data_dir)?;
        iat_store::export_csv_file(&fallback, [&record])
            .with_context(|| format!("writing fallback export {}", fallback.display()))?;
        println!(
            "Session {} could not be stored; results exported to {}",
            record.session_id,
            fallback.display()
        );
        Ok(())
    }
}

/// Roughly centres `text`; CJK glyphs count as two columns.
fn centered(out: &mut Stdout, width: u16, row: u16, text: &str) -> Result<()> {
    let cols: usize = text.chars().map(|c| if c.is_ascii() { 1 } else { 2 }).sum();
    let col = (width as usize).saturating_sub(cols) / 2;
    queue!(out, MoveTo(col as u16, row), Print(text))?;
    Ok(())
}
