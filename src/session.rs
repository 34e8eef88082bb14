use std::path::{Path, PathBuf};
use tracing::{info, trace, warn};

use crate::domain::SRError;
use crate::report::{self, Report, ReportKind};
use crate::table::Table;

/// Ordered set of column names, kept in the order the user picked them.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ColumnSelection {
    names: Vec<String>,
}

impl ColumnSelection {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// 1-based pick order of `name`, if selected.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name).map(|p| p + 1)
    }

    /// Appends `name` if absent, removes it otherwise. Returns true if selected afterwards.
    pub fn toggle(&mut self, name: &str) -> bool {
        if let Some(p) = self.names.iter().position(|n| n == name) {
            self.names.remove(p);
            false
        } else {
            self.names.push(name.to_string());
            true
        }
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }
}

#[derive(Debug, Default)]
pub enum ReportState {
    #[default]
    Idle,
    Ready(Report),
}

impl ReportState {
    pub fn report(&self) -> Option<&Report> {
        match self {
            ReportState::Idle => None,
            ReportState::Ready(report) => Some(report),
        }
    }
}

/// Everything one interactive session holds: the loaded table, the current
/// selection and the last generated report of each kind.
#[derive(Debug, Default)]
pub struct Session {
    table: Option<Table>,
    selection: ColumnSelection,
    graphs: ReportState,
    stats: ReportState,
}

impl Session {
    pub fn table(&self) -> Option<&Table> {
        self.table.as_ref()
    }

    pub fn selection(&self) -> &ColumnSelection {
        &self.selection
    }

    pub fn state(&self, kind: ReportKind) -> &ReportState {
        match kind {
            ReportKind::Graphs => &self.graphs,
            ReportKind::Stats => &self.stats,
        }
    }

    /// Loads `path`. The current table is only replaced when loading succeeds.
    pub fn open(&mut self, path: PathBuf) -> Result<&Table, SRError> {
        let table = Table::load(path)?;
        info!("Opened {} with {} rows", table.name(), table.nrows());
        self.set_table(table);
        self.table.as_ref().ok_or(SRError::NoTable)
    }

    pub fn set_table(&mut self, table: Table) {
        self.table = Some(table);
        self.selection.clear();
        self.reset_reports();
    }

    pub fn toggle(&mut self, name: &str) -> Result<bool, SRError> {
        let table = self.table.as_ref().ok_or(SRError::NoTable)?;
        if table.column(name).is_none() {
            return Err(SRError::UnknownColumn(name.to_string()));
        }
        let selected = self.selection.toggle(name);
        self.reset_reports();
        Ok(selected)
    }

    pub fn select_all(&mut self) -> Result<(), SRError> {
        let table = self.table.as_ref().ok_or(SRError::NoTable)?;
        for name in table.column_names() {
            if !self.selection.contains(name) {
                self.selection.toggle(name);
            }
        }
        self.reset_reports();
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.reset_reports();
    }

    /// Renders and packages one report. Returns the number of pages.
    ///
    /// On any failure the state of `kind` is left Idle.
    pub fn generate(&mut self, kind: ReportKind) -> Result<usize, SRError> {
        *self.state_mut(kind) = ReportState::Idle;
        let table = self.table.as_ref().ok_or(SRError::NoTable)?;
        if self.selection.is_empty() {
            warn!("Generate {:?} requested without a selection", kind);
            return Err(SRError::EmptySelection);
        }

        trace!("Rendering {:?} for {:?}", kind, self.selection.names());
        let pages = match kind {
            ReportKind::Graphs => report::distribution::render(table, &self.selection)?,
            ReportKind::Stats => {
                let today = chrono::Local::now().date_naive();
                report::summary::render(table, &self.selection, today)?
            }
        };
        let report = Report::package(kind, pages)?;
        let page_count = report.page_count();
        info!(
            "{} ready: {} page(s), {} bytes",
            report.file_name(),
            page_count,
            report.bytes().len()
        );
        *self.state_mut(kind) = ReportState::Ready(report);
        Ok(page_count)
    }

    /// Writes the ready report of `kind` into `output_dir` and returns to Idle.
    pub fn download(&mut self, kind: ReportKind, output_dir: &Path) -> Result<PathBuf, SRError> {
        let state = std::mem::take(self.state_mut(kind));
        match state {
            ReportState::Idle => Err(SRError::NotReady(kind.file_name())),
            ReportState::Ready(report) => report.save(output_dir),
        }
    }

    fn state_mut(&mut self, kind: ReportKind) -> &mut ReportState {
        match kind {
            ReportKind::Graphs => &mut self.graphs,
            ReportKind::Stats => &mut self.stats,
        }
    }

    fn reset_reports(&mut self) {
        self.graphs = ReportState::Idle;
        self.stats = ReportState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    fn session() -> Session {
        let table = Table::from_columns(
            "survey.csv",
            vec![
                Column::numeric(0, "age", &[20.0, 30.0, 30.0]),
                Column::text(1, "city", &["Rionegro", "La Ceja", "Rionegro"]),
                Column::numeric(2, "score", &[1.0, 2.0, 3.0]),
            ],
        )
        .unwrap();
        let mut session = Session::default();
        session.set_table(table);
        session
    }

    #[test]
    fn selection_keeps_pick_order() {
        let mut session = session();
        session.toggle("score").unwrap();
        session.toggle("age").unwrap();
        assert_eq!(session.selection().names(), &["score", "age"]);
        assert_eq!(session.selection().position("age"), Some(2));

        session.toggle("score").unwrap();
        assert_eq!(session.selection().names(), &["age"]);
    }

    #[test]
    fn select_all_appends_in_header_order() {
        let mut session = session();
        session.toggle("city").unwrap();
        session.select_all().unwrap();
        assert_eq!(session.selection().names(), &["city", "age", "score"]);
    }

    #[test]
    fn unknown_column_is_rejected() {
        let mut session = session();
        assert!(matches!(
            session.toggle("nope"),
            Err(SRError::UnknownColumn(_))
        ));
        assert!(session.selection().is_empty());
    }

    #[test]
    fn empty_selection_is_advisory_and_does_nothing() {
        let mut session = session();
        for kind in [ReportKind::Graphs, ReportKind::Stats] {
            let err = session.generate(kind).unwrap_err();
            assert!(matches!(err, SRError::EmptySelection));
            assert!(err.is_advisory());
            assert!(session.state(kind).report().is_none());
        }
    }

    #[test]
    fn selection_change_resets_ready_reports() {
        let mut session = session();
        session.toggle("age").unwrap();
        assert_eq!(session.generate(ReportKind::Graphs).unwrap(), 1);
        assert_eq!(session.generate(ReportKind::Stats).unwrap(), 1);
        assert!(session.state(ReportKind::Graphs).report().is_some());

        session.toggle("score").unwrap();
        assert!(session.state(ReportKind::Graphs).report().is_none());
        assert!(session.state(ReportKind::Stats).report().is_none());
    }

    #[test]
    fn failed_stats_leave_state_idle() {
        let mut session = session();
        session.toggle("age").unwrap();
        session.generate(ReportKind::Stats).unwrap();

        session.toggle("city").unwrap();
        let err = session.generate(ReportKind::Stats).unwrap_err();
        assert!(matches!(err, SRError::NonNumericColumns(ref c) if c == &["city"]));
        assert!(session.state(ReportKind::Stats).report().is_none());
    }

    #[test]
    fn download_writes_file_and_returns_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session();
        session.toggle("city").unwrap();
        session.toggle("age").unwrap();
        assert_eq!(session.generate(ReportKind::Graphs).unwrap(), 2);

        let path = session.download(ReportKind::Graphs, dir.path()).unwrap();
        assert_eq!(path, dir.path().join("graphs.pdf"));
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(session.state(ReportKind::Graphs).report().is_none());

        assert!(matches!(
            session.download(ReportKind::Graphs, dir.path()),
            Err(SRError::NotReady("graphs.pdf"))
        ));
    }

    #[test]
    fn generate_without_table_is_advisory() {
        let mut session = Session::default();
        let err = session.generate(ReportKind::Graphs).unwrap_err();
        assert!(matches!(err, SRError::NoTable));
        assert!(err.is_advisory());
    }
}
