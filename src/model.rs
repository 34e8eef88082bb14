use ratatui::crossterm::event::KeyEvent;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, trace, warn};

use crate::domain::{CMDMode, HELP_TEXT, Message, SRConfig, SRError};
use crate::inputter::{InputResult, Inputter};
use crate::report::ReportKind;
use crate::session::{ReportState, Session};
use crate::ui::{BODY_MIN_HEIGHT, CMDLINE_HEIGH, FOOTER_HEIGHT, INSTRUCTIONS_HEIGHT, LIST_HEADER_HEIGHT};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    COLUMNS,
    POPUP,
    CMDINPUT,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnEntry {
    pub name: String,
    pub dtype: String,
    pub numeric: bool,
    /// 1-based pick order when selected
    pub selected: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportEntry {
    pub file_name: &'static str,
    pub state: String,
    pub ready: bool,
}

pub struct UIData {
    pub name: String,
    pub banner: String,
    pub columns: Vec<ColumnEntry>,
    pub nrows: usize,
    pub selected_row: usize,
    pub offset_row: usize,
    pub reports: Vec<ReportEntry>,
    pub show_popup: bool,
    pub popup_message: String,
    pub layout: UILayout,
    pub last_update: Instant,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub status_message: String,
    pub status_level: MessageLevel,
    pub last_status_message_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            banner: String::new(),
            columns: Vec::new(),
            nrows: 0,
            selected_row: 0,
            offset_row: 0,
            reports: Vec::new(),
            show_popup: false,
            popup_message: String::new(),
            layout: UILayout::default(),
            last_update: Instant::now(),
            cmdinput: InputResult::default(),
            cmd_mode: None,
            active_cmdinput: false,
            status_message: String::new(),
            status_level: MessageLevel::Info,
            last_status_message_update: Instant::now(),
        }
    }
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub header_height: usize,
    pub list_height: usize,
    pub statusline_width: usize,
    pub statusline_height: usize,
}

impl UILayout {
    pub fn from_values(banner_lines: usize, ui_width: usize, ui_height: usize) -> Self {
        let header_height = banner_lines + INSTRUCTIONS_HEIGHT;
        // 2 for the outer border
        let body_height = ui_height
            .saturating_sub(header_height + CMDLINE_HEIGH + FOOTER_HEIGHT + 2)
            .max(BODY_MIN_HEIGHT);
        let list_height = body_height.saturating_sub(2 + LIST_HEADER_HEIGHT).max(1);

        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            header_height,
            list_height,
            statusline_width: ui_width.saturating_sub(2),
            statusline_height: CMDLINE_HEIGH,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct Model {
    config: SRConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    session: Session,
    banner: String,
    curser_row: usize,
    offset_row: usize,
    uilayout: UILayout,
    uidata: UIData,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    active_cmdinput: bool,
    status_message: String,
    status_level: MessageLevel,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(config: &SRConfig, banner: String, ui_width: usize, ui_height: usize) -> Self {
        let banner_lines = banner.lines().count();
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::COLUMNS,
            previous_modus: Modus::COLUMNS,
            session: Session::default(),
            banner,
            curser_row: 0,
            offset_row: 0,
            uilayout: UILayout::from_values(banner_lines, ui_width, ui_height),
            uidata: UIData::empty(),
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            status_message: String::new(),
            status_level: MessageLevel::Info,
            last_status_message_update: Instant::now(),
        };
        model.set_status_message(MessageLevel::Info, "Press 'o' to open a CSV file, '?' for help.");
        model
    }

    /// Opens `path` as the session table. Load errors are shown, the previous table stays.
    pub fn load_data_file(&mut self, path: PathBuf) -> bool {
        let start_time = Instant::now();
        match self.session.open(path) {
            Ok(table) => {
                let message = format!(
                    "Loaded {} ({} rows, {} columns) in {}ms",
                    table.name(),
                    table.nrows(),
                    table.columns().len(),
                    start_time.elapsed().as_millis()
                );
                self.curser_row = 0;
                self.offset_row = 0;
                self.set_status_message(MessageLevel::Info, message);
                true
            }
            Err(e) => {
                error!("Loading failed: {e:?}");
                self.report_error(e);
                false
            }
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), SRError> {
        if let Some(msg) = message {
            match self.modus {
                Modus::COLUMNS => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_selection_down(1),
                    Message::MoveUp => self.move_selection_up(1),
                    Message::MoveBeginning => self.move_selection_beginning(),
                    Message::MoveEnd => self.move_selection_end(),
                    Message::ToggleColumn => self.toggle_current_column(),
                    Message::SelectAll => self.select_all(),
                    Message::ClearSelection => self.clear_selection(),
                    Message::GenerateGraphs => self.generate(ReportKind::Graphs),
                    Message::GenerateStats => self.generate(ReportKind::Stats),
                    Message::DownloadGraphs => self.download(ReportKind::Graphs),
                    Message::DownloadStats => self.download(ReportKind::Stats),
                    Message::OpenFile => self.enter_cmd_mode(CMDMode::OpenFile),
                    Message::Help => self.show_help(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Exit | Message::Help => self.exit(),
                    _ => (),
                },
                Modus::CMDINPUT => match msg {
                    Message::RawKey(key) => self.raw_input(key),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
            }
        }

        self.update_uidata();
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn exit(&mut self) {
        if self.modus == Modus::POPUP {
            trace!("Close popup ...");
            self.modus = self.previous_modus;
            self.previous_modus = Modus::POPUP;
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(self.banner.lines().count(), width, height);
        self.scroll_to_curser();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if self.active_cmdinput {
            self.last_input = self.input.read(key);
            if self.last_input.finished {
                self.handle_cmd_input();
            }
        }
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {:?} ...", mode);
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.active_cmdinput = true;
        self.input.clear();
        if let Some(path) = self.session.table().and_then(|t| t.path()) {
            self.input.set(&path.to_string_lossy());
        }
        self.last_input = self.input.get();
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {}", self.last_input.input);

        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;
        let mode = self.cmd_mode.take();

        if self.last_input.canceled {
            self.set_status_message(MessageLevel::Info, "Canceled.");
            return;
        }

        match mode {
            Some(CMDMode::OpenFile) => {
                let raw = self.last_input.input.trim().to_string();
                if raw.is_empty() {
                    self.set_status_message(MessageLevel::Warning, "No file given.");
                    return;
                }
                match shellexpand::full(&raw) {
                    Ok(expanded) => {
                        self.load_data_file(PathBuf::from(expanded.as_ref()));
                    }
                    Err(e) => self.report_error(SRError::LoadingFailed(e.to_string())),
                }
            }
            None => {}
        }
    }

    fn current_column_name(&self) -> Option<String> {
        self.session
            .table()
            .and_then(|t| t.columns().get(self.curser_row))
            .map(|c| c.name.clone())
    }

    fn toggle_current_column(&mut self) {
        let Some(name) = self.current_column_name() else {
            self.report_error(SRError::NoTable);
            return;
        };
        match self.session.toggle(&name) {
            Ok(true) => self.set_status_message(MessageLevel::Info, format!("Selected {name}")),
            Ok(false) => self.set_status_message(MessageLevel::Info, format!("Unselected {name}")),
            Err(e) => self.report_error(e),
        }
    }

    fn select_all(&mut self) {
        match self.session.select_all() {
            Ok(_) => {
                let count = self.session.selection().len();
                self.set_status_message(MessageLevel::Info, format!("Selected {count} columns"));
            }
            Err(e) => self.report_error(e),
        }
    }

    fn clear_selection(&mut self) {
        self.session.clear_selection();
        self.set_status_message(MessageLevel::Info, "Selection cleared");
    }

    fn generate(&mut self, kind: ReportKind) {
        let start_time = Instant::now();
        match self.session.generate(kind) {
            Ok(pages) => {
                let key = match kind {
                    ReportKind::Graphs => 'G',
                    ReportKind::Stats => 'S',
                };
                self.set_status_message(
                    MessageLevel::Info,
                    format!(
                        "{} ready ({pages} page(s), {}ms). Press '{key}' to save it.",
                        kind.file_name(),
                        start_time.elapsed().as_millis()
                    ),
                );
            }
            Err(e) => self.report_error(e),
        }
    }

    fn download(&mut self, kind: ReportKind) {
        let output_dir = self.config.output_dir.clone();
        match self.session.download(kind, &output_dir) {
            Ok(path) => self.set_status_message(
                MessageLevel::Info,
                format!("Saved {}", path.display()),
            ),
            Err(e) => self.report_error(e),
        }
    }

    fn report_error(&mut self, e: SRError) {
        if e.is_advisory() {
            warn!("{e}");
            self.set_status_message(MessageLevel::Warning, e.to_string());
        } else {
            error!("{e}");
            self.set_status_message(MessageLevel::Error, e.to_string());
        }
    }

    fn set_status_message(&mut self, level: MessageLevel, message: impl Into<String>) {
        self.status_message = message.into();
        self.status_level = level;
        self.last_status_message_update = Instant::now();
        info!("Status: {}", self.status_message);
        self.update_uidata();
    }

    fn ncolumns(&self) -> usize {
        self.session.table().map(|t| t.columns().len()).unwrap_or(0)
    }

    fn scroll_to_curser(&mut self) {
        let height = self.uilayout.list_height.max(1);
        if self.curser_row < self.offset_row {
            self.offset_row = self.curser_row;
        } else if self.curser_row >= self.offset_row + height {
            self.offset_row = self.curser_row + 1 - height;
        }
    }

    fn move_selection_up(&mut self, size: usize) {
        self.curser_row = self.curser_row.saturating_sub(size);
        self.scroll_to_curser();
    }

    fn move_selection_down(&mut self, size: usize) {
        let last = self.ncolumns().saturating_sub(1);
        self.curser_row = (self.curser_row + size).min(last);
        self.scroll_to_curser();
    }

    fn move_selection_beginning(&mut self) {
        self.curser_row = 0;
        self.scroll_to_curser();
    }

    fn move_selection_end(&mut self) {
        self.curser_row = self.ncolumns().saturating_sub(1);
        self.scroll_to_curser();
    }

    fn report_entry(&self, kind: ReportKind) -> ReportEntry {
        match self.session.state(kind) {
            ReportState::Idle => ReportEntry {
                file_name: kind.file_name(),
                state: "idle".to_string(),
                ready: false,
            },
            ReportState::Ready(report) => ReportEntry {
                file_name: kind.file_name(),
                state: format!(
                    "ready, {} page(s), {} KiB, {}",
                    report.page_count(),
                    report.bytes().len().div_ceil(1024),
                    report.mime()
                ),
                ready: true,
            },
        }
    }

    fn update_uidata(&mut self) {
        let selection = self.session.selection();
        let columns = self
            .session
            .table()
            .map(|t| {
                t.columns()
                    .iter()
                    .map(|c| ColumnEntry {
                        name: c.name.clone(),
                        dtype: c.dtype.to_string(),
                        numeric: c.is_numeric(),
                        selected: selection.position(&c.name),
                    })
                    .collect()
            })
            .unwrap_or_default();

        self.uidata = UIData {
            name: self
                .session
                .table()
                .map(|t| t.name().to_string())
                .unwrap_or_else(|| "no file".to_string()),
            banner: self.banner.clone(),
            columns,
            nrows: self.session.table().map(|t| t.nrows()).unwrap_or(0),
            selected_row: self.curser_row,
            offset_row: self.offset_row,
            reports: vec![
                self.report_entry(ReportKind::Graphs),
                self.report_entry(ReportKind::Stats),
            ],
            show_popup: self.modus == Modus::POPUP,
            popup_message: HELP_TEXT.to_string(),
            layout: self.uilayout.clone(),
            last_update: Instant::now(),
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode,
            active_cmdinput: self.active_cmdinput,
            status_message: self.status_message.clone(),
            status_level: self.status_level,
            last_status_message_update: self.last_status_message_update,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};
    use std::fs;

    fn model_with_csv(dir: &tempfile::TempDir) -> Model {
        let path = dir.path().join("encuesta.csv");
        fs::write(
            &path,
            "edad,ciudad,satisfaccion\n30,Rionegro,4\n41,La Ceja,5\n30,Rionegro,3\n",
        )
        .unwrap();
        let config = SRConfig::default().output_dir(dir.path().to_path_buf());
        let mut model = Model::init(&config, "LOGO".to_string(), 120, 40);
        assert!(model.load_data_file(path));
        model
    }

    fn send(model: &mut Model, messages: &[Message]) {
        for m in messages {
            model.update(Some(m.clone())).unwrap();
        }
    }

    #[test]
    fn shows_header_columns_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let model = model_with_csv(&dir);
        let names: Vec<&str> = model
            .get_uidata()
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["edad", "ciudad", "satisfaccion"]);
        assert_eq!(model.get_uidata().nrows, 3);
    }

    #[test]
    fn empty_selection_warns_once_and_builds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = model_with_csv(&dir);

        send(&mut model, &[Message::GenerateGraphs]);
        let ui = model.get_uidata();
        assert_eq!(ui.status_level, MessageLevel::Warning);
        assert_eq!(ui.status_message, "Please select at least one column.");
        assert!(ui.reports.iter().all(|r| !r.ready));

        send(&mut model, &[Message::GenerateStats]);
        assert_eq!(model.get_uidata().status_level, MessageLevel::Warning);
        assert!(model.session().state(ReportKind::Stats).report().is_none());
    }

    #[test]
    fn generate_and_download_graphs() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = model_with_csv(&dir);

        send(
            &mut model,
            &[
                Message::MoveDown,
                Message::ToggleColumn,
                Message::MoveUp,
                Message::ToggleColumn,
                Message::GenerateGraphs,
            ],
        );
        let ui = model.get_uidata();
        assert_eq!(ui.columns[1].selected, Some(1));
        assert_eq!(ui.columns[0].selected, Some(2));
        assert!(ui.reports[0].ready);
        assert_eq!(
            model.session().state(ReportKind::Graphs).report().map(|r| r.page_count()),
            Some(2)
        );

        send(&mut model, &[Message::DownloadGraphs]);
        assert!(dir.path().join("graphs.pdf").exists());
        assert!(!model.get_uidata().reports[0].ready);
    }

    #[test]
    fn stats_on_text_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = model_with_csv(&dir);
        send(&mut model, &[Message::SelectAll, Message::GenerateStats]);

        let ui = model.get_uidata();
        assert_eq!(ui.status_level, MessageLevel::Error);
        assert_eq!(ui.status_message, "Non-numeric column(s): ciudad");
        assert!(!ui.reports[1].ready);
    }

    #[test]
    fn download_before_generate_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = model_with_csv(&dir);
        send(&mut model, &[Message::DownloadStats]);
        assert_eq!(
            model.get_uidata().status_message,
            "stats_summary.pdf has not been generated yet"
        );
        assert!(!dir.path().join("stats_summary.pdf").exists());
    }

    #[test]
    fn open_prompt_keeps_table_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = model_with_csv(&dir);
        send(&mut model, &[Message::OpenFile]);
        assert!(model.raw_keyevents());

        // replace the prefilled path
        send(
            &mut model,
            &[Message::RawKey(KeyEvent::new(KeyCode::End, KeyModifiers::NONE))],
        );
        for _ in 0..200 {
            send(
                &mut model,
                &[Message::RawKey(KeyEvent::new(KeyCode::Backspace, KeyModifiers::NONE))],
            );
        }
        for c in "missing.csv".chars() {
            send(
                &mut model,
                &[Message::RawKey(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))],
            );
        }
        send(
            &mut model,
            &[Message::RawKey(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE))],
        );

        assert!(!model.raw_keyevents());
        let ui = model.get_uidata();
        assert_eq!(ui.status_level, MessageLevel::Error);
        assert_eq!(ui.name, "encuesta.csv");
    }

    #[test]
    fn help_popup_opens_and_closes() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = model_with_csv(&dir);
        send(&mut model, &[Message::Help]);
        assert!(model.get_uidata().show_popup);
        send(&mut model, &[Message::GenerateGraphs, Message::Exit]);
        assert!(!model.get_uidata().show_popup);
        assert!(!model.get_uidata().reports[0].ready);
    }

    #[test]
    fn curser_stays_in_column_range() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = model_with_csv(&dir);
        send(&mut model, &[Message::MoveEnd, Message::MoveDown, Message::MoveDown]);
        assert_eq!(model.get_uidata().selected_row, 2);
        send(&mut model, &[Message::MoveBeginning, Message::MoveUp]);
        assert_eq!(model.get_uidata().selected_row, 0);
    }
}
