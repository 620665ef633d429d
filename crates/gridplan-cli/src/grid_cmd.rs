//! `gridplan grid` command: print the feed grid preview for a month.

use anyhow::{Context, Result, bail};

use gridplan_core::MonthKey;
use gridplan_core::feed::FeedGrid;

use crate::session::Session;

const CELL_WIDTH: usize = 26;

/// Run the grid command.
///
/// `swaps` holds flattened `I J` pairs applied in order as a display-only
/// overlay; nothing is written back.
pub async fn run_grid(
    session: &Session,
    month: MonthKey,
    swaps: &[usize],
    json: bool,
) -> Result<()> {
    if swaps.len() % 2 != 0 {
        bail!("--swap takes two slot indices");
    }

    let mut planner = session.planner(month).await?;

    for pair in swaps.chunks(2) {
        let (a, b) = (pair[0], pair[1]);
        planner
            .arm_swap(a)
            .with_context(|| format!("cannot swap slots {a} and {b}"))?;
        planner
            .confirm_swap(b)
            .with_context(|| format!("cannot swap slots {a} and {b}"))?;
    }
    let grid = planner.displayed_grid();

    if json {
        println!("{}", serde_json::to_string_pretty(grid.slots())?);
        return Ok(());
    }

    println!(
        "Feed grid for {month}: {}/{} slots filled",
        grid.occupied(),
        grid.capacity()
    );
    if !swaps.is_empty() {
        println!("(manual order preview, not saved)");
    }
    println!();
    print_rows(&grid);
    Ok(())
}

fn cell(grid: &FeedGrid, index: usize) -> String {
    let text = match grid.get(index) {
        Some(post) => {
            let date = post
                .scheduled_date
                .map(|d| d.format("%m-%d ").to_string())
                .unwrap_or_default();
            let label = post.topic.as_deref().unwrap_or(post.id.as_str());
            format!("{date}{} {label}", post.post_type)
        }
        None => "(open)".to_string(),
    };
    let mut cell = format!("{index:>2} {text}");
    if cell.chars().count() > CELL_WIDTH {
        cell = cell.chars().take(CELL_WIDTH - 1).collect::<String>() + "…";
    }
    format!("{cell:<width$}", width = CELL_WIDTH)
}

fn print_rows(grid: &FeedGrid) {
    let mut index = 0;
    for row in grid.rows() {
        let cells: Vec<String> = (index..index + row.len()).map(|i| cell(grid, i)).collect();
        println!("| {} |", cells.join(" | "));
        index += row.len();
    }
}
