use std::collections::BTreeMap;
use tracing::{debug, trace};

use super::pdf::{PAGE_HEIGHT, PAGE_WIDTH};
use super::{Align, Area, BLACK, Page, SKY_BLUE, Shape, fit_text};
use crate::domain::SRError;
use crate::session::ColumnSelection;
use crate::table::{Column, Table};

pub const Y_LABEL: &str = "Respondents";
/// Bar label of the missing cells.
pub const EMPTY_LABEL: &str = "(empty)";

const MARGIN_LEFT: f32 = 30.0;
const MARGIN_RIGHT: f32 = 15.0;
const MARGIN_BOTTOM: f32 = 45.0;
const MARGIN_TOP: f32 = 35.0;
const BAR_FILL_RATIO: f32 = 0.8;
const AXIS_THICKNESS: f32 = 0.4;
const MAX_Y_TICKS: usize = 8;
const TITLE_SIZE: f32 = 18.0;
const AXIS_LABEL_SIZE: f32 = 14.0;
const TICK_LABEL_SIZE: f32 = 10.0;

/// Occurrences of every distinct value of one column, ordered by the value text.
/// Missing cells are tallied as `None`, after all the values.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyCount {
    pub column: String,
    pub entries: Vec<(Option<String>, usize)>,
}

impl FrequencyCount {
    pub fn of(column: &Column) -> Self {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        let mut missing = 0;
        for value in column.data.iter() {
            match value {
                Some(value) => *counts.entry(value.as_str()).or_insert(0) += 1,
                None => missing += 1,
            }
        }

        let mut entries: Vec<(Option<String>, usize)> = counts
            .into_iter()
            .map(|(value, count)| (Some(value.to_string()), count))
            .collect();
        if missing > 0 {
            entries.push((None, missing));
        }
        Self {
            column: column.name.clone(),
            entries,
        }
    }

    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, c)| c).sum()
    }

    pub fn max_count(&self) -> usize {
        self.entries.iter().map(|(_, c)| *c).max().unwrap_or(0)
    }
}

/// One bar chart page per selected column, in selection order.
pub fn render(table: &Table, selection: &ColumnSelection) -> Result<Vec<Page>, SRError> {
    selection
        .names()
        .iter()
        .map(|name| {
            let column = table
                .column(name)
                .ok_or_else(|| SRError::UnknownColumn(name.clone()))?;
            let frequency = FrequencyCount::of(column);
            debug!(
                "{}: {} distinct values over {} rows",
                name,
                frequency.entries.len(),
                frequency.total()
            );
            let page = chart_page(&frequency);
            trace!("{}: {} bars, {} shapes", name, page.bars().count(), page.shapes.len());
            Ok(page)
        })
        .collect()
}

/// Tick step giving at most [`MAX_Y_TICKS`] integer ticks above zero.
fn tick_step(max_count: usize) -> usize {
    max_count.div_ceil(MAX_Y_TICKS).max(1)
}

fn chart_page(frequency: &FrequencyCount) -> Page {
    let mut page = Page::default();
    let plot = Area {
        x: MARGIN_LEFT,
        y: MARGIN_BOTTOM,
        width: PAGE_WIDTH - MARGIN_LEFT - MARGIN_RIGHT,
        height: PAGE_HEIGHT - MARGIN_BOTTOM - MARGIN_TOP,
    };

    page.text(
        PAGE_WIDTH / 2.0,
        PAGE_HEIGHT - 20.0,
        TITLE_SIZE,
        true,
        Align::Center,
        &format!("Distribution of {}", frequency.column),
    );

    // y axis with integer ticks
    let step = tick_step(frequency.max_count());
    let top = frequency.max_count().div_ceil(step).max(1) * step;
    page.push(Shape::Rect {
        area: Area {
            x: plot.x,
            y: plot.y,
            width: AXIS_THICKNESS,
            height: plot.height,
        },
        fill: BLACK,
        edge: None,
    });
    for tick in (0..=top).step_by(step) {
        let y = plot.y + plot.height * tick as f32 / top as f32;
        page.push(Shape::Rect {
            area: Area {
                x: plot.x - 2.0,
                y,
                width: 2.0,
                height: AXIS_THICKNESS,
            },
            fill: BLACK,
            edge: None,
        });
        page.text(
            plot.x - 3.0,
            y - 1.2,
            TICK_LABEL_SIZE,
            false,
            Align::Right,
            &tick.to_string(),
        );
    }
    page.text(
        plot.x,
        plot.y + plot.height + 5.0,
        AXIS_LABEL_SIZE,
        false,
        Align::Left,
        Y_LABEL,
    );

    // x axis
    page.push(Shape::Rect {
        area: Area {
            x: plot.x,
            y: plot.y,
            width: plot.width,
            height: AXIS_THICKNESS,
        },
        fill: BLACK,
        edge: None,
    });

    let slot = plot.width / frequency.entries.len().max(1) as f32;
    let bar_width = slot * BAR_FILL_RATIO;
    for (idx, (value, count)) in frequency.entries.iter().enumerate() {
        let center = plot.x + slot * (idx as f32 + 0.5);
        page.push(Shape::Bar {
            area: Area {
                x: center - bar_width / 2.0,
                y: plot.y,
                width: bar_width,
                height: plot.height * *count as f32 / top as f32,
            },
            fill: SKY_BLUE,
            edge: BLACK,
        });

        let label = value.as_deref().unwrap_or(EMPTY_LABEL);
        page.text(
            center,
            plot.y - 7.0,
            TICK_LABEL_SIZE,
            false,
            Align::Center,
            &fit_text(label, TICK_LABEL_SIZE, slot),
        );
    }

    page.text(
        PAGE_WIDTH / 2.0,
        plot.y - 20.0,
        AXIS_LABEL_SIZE,
        false,
        Align::Center,
        &fit_text(&frequency.column, AXIS_LABEL_SIZE, plot.width),
    );

    page
}
