use chrono::NaiveDate;
use tracing::{debug, warn};

use super::pdf::{PAGE_HEIGHT, PAGE_WIDTH};
use super::{Align, Area, BLACK, HEADER_GREEN, Page, Shape, WHITE, fit_text};
use crate::domain::SRError;
use crate::session::ColumnSelection;
use crate::table::{Column, Table};

pub const TITLE: &str = "Statistical Summary";
pub const HEADERS: [&str; 5] = ["Column", "Max", "Min", "Mean", "Std Dev"];

const TABLE_LEFT: f32 = 30.0;
const TABLE_TOP: f32 = 160.0;
const TABLE_BOTTOM: f32 = 20.0;
const MAX_ROW_HEIGHT: f32 = 12.0;
const MAX_CELL_FONT: f32 = 14.0;
const HEADING_SIZE: f32 = 24.0;
const SUBTITLE_SIZE: f32 = 18.0;

#[derive(Debug, Clone, PartialEq)]
pub struct StatsRow {
    pub column: String,
    pub max: String,
    pub min: String,
    pub mean: String,
    pub std: String,
}

impl StatsRow {
    /// Max, min, mean and sample standard deviation of the non-null values.
    pub fn of(column: &Column) -> Result<Self, SRError> {
        let numbers = column
            .numbers
            .as_ref()
            .ok_or_else(|| SRError::NonNumericColumns(vec![column.name.clone()]))?;
        let values: Vec<f64> = numbers.iter().flatten().copied().collect();

        let n = values.len() as f64;
        let max = values.iter().copied().fold(f64::NAN, f64::max);
        let min = values.iter().copied().fold(f64::NAN, f64::min);
        let mean = if values.is_empty() {
            f64::NAN
        } else {
            values.iter().sum::<f64>() / n
        };
        let std = if values.len() < 2 {
            f64::NAN
        } else {
            let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (squares / (n - 1.0)).sqrt()
        };

        Ok(Self {
            column: column.name.clone(),
            max: two_decimals(max),
            min: two_decimals(min),
            mean: two_decimals(mean),
            std: two_decimals(std),
        })
    }

    fn cells(&self) -> [&str; 5] {
        [&self.column, &self.max, &self.min, &self.mean, &self.std]
    }
}

fn two_decimals(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        format!("{value:.2}")
    }
}

/// Computes one row per selected column after checking that every one is numeric.
pub fn stats_rows(table: &Table, selection: &ColumnSelection) -> Result<Vec<StatsRow>, SRError> {
    let columns = selection
        .names()
        .iter()
        .map(|name| {
            table
                .column(name)
                .ok_or_else(|| SRError::UnknownColumn(name.clone()))
        })
        .collect::<Result<Vec<&Column>, SRError>>()?;

    let non_numeric: Vec<String> = columns
        .iter()
        .filter(|c| !c.is_numeric())
        .map(|c| c.name.clone())
        .collect();
    if !non_numeric.is_empty() {
        warn!("Statistics requested on non-numeric columns {:?}", non_numeric);
        return Err(SRError::NonNumericColumns(non_numeric));
    }

    columns.into_iter().map(StatsRow::of).collect()
}

/// A single dated page holding the summary table.
pub fn render(
    table: &Table,
    selection: &ColumnSelection,
    date: NaiveDate,
) -> Result<Vec<Page>, SRError> {
    let rows = stats_rows(table, selection)?;
    for row in rows.iter() {
        debug!("{:?}", row);
    }
    Ok(vec![summary_page(&rows, date)])
}

fn summary_page(rows: &[StatsRow], date: NaiveDate) -> Page {
    let mut page = Page::default();
    page.text(
        PAGE_WIDTH / 2.0,
        PAGE_HEIGHT - 18.0,
        HEADING_SIZE,
        true,
        Align::Center,
        &format!("{TITLE} {}", date.format("%d/%m/%Y")),
    );
    page.text(
        PAGE_WIDTH / 2.0,
        PAGE_HEIGHT - 34.0,
        SUBTITLE_SIZE,
        true,
        Align::Center,
        TITLE,
    );

    let table_width = PAGE_WIDTH - 2.0 * TABLE_LEFT;
    let cell_width = table_width / HEADERS.len() as f32;
    let row_height = ((TABLE_TOP - TABLE_BOTTOM) / (rows.len() + 1) as f32).min(MAX_ROW_HEIGHT);
    // cap height of a line is roughly 0.7 of the font size
    let font_size = (row_height / 0.3528 * 0.6).min(MAX_CELL_FONT);

    let header: [&str; 5] = HEADERS;
    let lines = std::iter::once((header, true)).chain(rows.iter().map(|r| (r.cells(), false)));
    for (line, (cells, header)) in lines.enumerate() {
        let y = TABLE_TOP - row_height * (line + 1) as f32;
        for (idx, cell) in cells.iter().enumerate() {
            let x = TABLE_LEFT + cell_width * idx as f32;
            page.push(Shape::Rect {
                area: Area {
                    x,
                    y,
                    width: cell_width,
                    height: row_height,
                },
                fill: if header { HEADER_GREEN } else { WHITE },
                edge: Some(BLACK),
            });
            page.text(
                x + cell_width / 2.0,
                y + (row_height - font_size * 0.3528 * 0.7) / 2.0,
                font_size,
                header,
                Align::Center,
                &fit_text(cell, font_size, cell_width - 2.0),
            );
        }
    }
    page
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table::from_columns(
            "survey.csv",
            vec![
                Column::numeric(0, "score", &[1.0, 2.0, 3.0, 4.0]),
                Column::text(1, "city", &["a", "b", "c", "d"]),
                Column::numeric(2, "single", &[7.0, 7.0, 7.0, 7.0]),
                Column::text(3, "comment", &["x", "y", "z", "w"]),
            ],
        )
        .unwrap()
    }

    fn select(names: &[&str]) -> ColumnSelection {
        let mut selection = ColumnSelection::default();
        for name in names {
            selection.toggle(name);
        }
        selection
    }

    #[test]
    fn stats_of_one_to_four() {
        let table = table();
        let row = StatsRow::of(table.column("score").unwrap()).unwrap();
        assert_eq!(
            row,
            StatsRow {
                column: "score".to_string(),
                max: "4.00".to_string(),
                min: "1.00".to_string(),
                mean: "2.50".to_string(),
                std: "1.29".to_string(),
            }
        );
    }

    #[test]
    fn nulls_are_skipped() {
        let mut column = Column::numeric(0, "n", &[1.0, 3.0, 0.0]);
        column.numbers = Some(vec![Some(1.0), Some(3.0), None]);
        let row = StatsRow::of(&column).unwrap();
        assert_eq!(row.mean, "2.00");
        assert_eq!(row.std, "1.41");
    }

    #[test]
    fn undefined_values_render_as_nan() {
        let mut column = Column::numeric(0, "n", &[5.0]);
        let row = StatsRow::of(&column).unwrap();
        assert_eq!(row.max, "5.00");
        assert_eq!(row.std, "nan");

        column.numbers = Some(vec![None]);
        let row = StatsRow::of(&column).unwrap();
        assert_eq!(row.max, "nan");
        assert_eq!(row.mean, "nan");
    }

    #[test]
    fn non_numeric_columns_are_all_named() {
        let table = table();
        let selection = select(&["city", "score", "comment"]);
        match stats_rows(&table, &selection) {
            Err(SRError::NonNumericColumns(names)) => assert_eq!(names, vec!["city", "comment"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rows_follow_selection_order() {
        let table = table();
        let rows = stats_rows(&table, &select(&["single", "score"])).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.column.as_str()).collect();
        assert_eq!(names, vec!["single", "score"]);
        assert_eq!(rows[0].std, "0.00");
    }

    #[test]
    fn single_dated_page() {
        let table = table();
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let pages = render(&table, &select(&["score", "single"]), date).unwrap();

        assert_eq!(pages.len(), 1);
        let texts: Vec<&str> = pages[0].texts().collect();
        assert!(texts.contains(&"Statistical Summary 09/03/2024"));
        assert!(texts.contains(&"Std Dev"));
        assert!(texts.contains(&"1.29"));
        // header plus two rows, five cells each
        let cells = pages[0]
            .shapes
            .iter()
            .filter(|s| matches!(s, Shape::Rect { .. }))
            .count();
        assert_eq!(cells, 15);
    }
}
