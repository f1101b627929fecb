use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use gridmerge::constants::{INTERACT_RADIUS, SAVE_KEY, VIEW_MARGIN, WIN_VALUE};
use gridmerge::engine::{GameConfig, GameEngine, WinBannerPolicy};
use gridmerge::input_protocol::{parse_command, ParsedCommand, HELP};
use gridmerge::movement::{LocationProvider, ManualLocation, NoLocation};
use gridmerge::save_store::{default_save_dir, FileKeyValueStore};
use gridmerge::types::{CellCoord, RenderCommand, RuntimeEvent};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Play the token merge game in a terminal")]
struct Cli {
    /// Directory holding the save file. Defaults to $GRIDMERGE_SAVE_DIR or .data
    #[arg(long)]
    save_dir: Option<PathBuf>,
    #[arg(long, default_value_t = INTERACT_RADIUS)]
    interact_radius: i32,
    #[arg(long, default_value_t = WIN_VALUE)]
    win_value: u32,
    #[arg(long, default_value_t = VIEW_MARGIN)]
    margin: i32,
    #[arg(long, value_enum, default_value_t = WinBannerPolicy::Sticky)]
    banner: WinBannerPolicy,
    /// Pretend the host has no location capability.
    #[arg(long)]
    no_geolocation: bool,
    /// Radius of the ASCII map printed after each command.
    #[arg(long, default_value_t = 4)]
    draw_radius: i32,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let save_dir = cli.save_dir.clone().unwrap_or_else(default_save_dir);
    info!(save_dir = %save_dir.display(), "starting terminal session");

    let config = GameConfig {
        interact_radius: cli.interact_radius.max(0),
        win_value: cli.win_value.max(1),
        view_margin: cli.margin.max(0),
        win_banner: cli.banner,
        save_key: SAVE_KEY.to_string(),
        ..GameConfig::default()
    };
    let location: Box<dyn LocationProvider> = if cli.no_geolocation {
        Box::new(NoLocation)
    } else {
        Box::new(ManualLocation::new())
    };
    let mut engine = GameEngine::start(config, Box::new(FileKeyValueStore::new(save_dir)), location);
    flush(&mut engine, cli.draw_radius);

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(read_error) => {
                error!(%read_error, "failed to read input");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let Some(command) = parse_command(&line) else {
            println!("unknown command, try `help`");
            continue;
        };
        match command {
            ParsedCommand::Move { dir } => {
                if !engine.press_direction(dir) {
                    println!("buttons are disabled in geolocation mode");
                }
            }
            ParsedCommand::Click { coord } => {
                let event = engine.handle_interaction(coord);
                println!("{coord}: {event:?}");
            }
            ParsedCommand::Location { point } => {
                engine.location_sample(point);
            }
            ParsedCommand::Mode { mode } => {
                if let Err(error) = engine.set_movement_mode(mode) {
                    println!("{error}");
                }
            }
            ParsedCommand::View {
                north_west,
                south_east,
            } => engine.map_moved(north_west, south_east),
            ParsedCommand::Reset => engine.reset(),
            ParsedCommand::Status => println!("{}", engine.hud_text()),
            ParsedCommand::Help => println!("{HELP}"),
            ParsedCommand::Quit => break,
        }
        flush(&mut engine, cli.draw_radius);
    }

    engine.shutdown();
}

fn flush(engine: &mut GameEngine, draw_radius: i32) {
    let mut redraw = false;
    for command in engine.drain_render() {
        match command {
            RenderCommand::Hud { text } => println!("[hud] {text}"),
            RenderCommand::Draw { .. }
            | RenderCommand::Refresh { .. }
            | RenderCommand::Remove { .. }
            | RenderCommand::Recenter { .. } => redraw = true,
        }
    }
    for event in engine.drain_events() {
        match event {
            RuntimeEvent::Won { value } => println!("*** crafted {value} ***"),
            RuntimeEvent::PersistenceWriteFailed { message }
            | RuntimeEvent::LocationUnavailable { message } => println!("warning: {message}"),
            _ => {}
        }
    }
    if redraw {
        print_map(engine, draw_radius);
    }
    let _ = io::stdout().flush();
}

/// North at the top. `@` marks the player, `.` an empty cell. Rows or
/// columns past the edge of the grid are left blank.
fn print_map(engine: &GameEngine, radius: i32) {
    for row in map_rows(engine, radius) {
        println!("{row}");
    }
}

fn map_rows(engine: &GameEngine, radius: i32) -> Vec<String> {
    let center = engine.player().position;
    let mut rows = Vec::new();
    for di in (-radius..=radius).rev() {
        let mut row = String::new();
        for dj in -radius..=radius {
            let coord = center
                .i
                .checked_add(di)
                .zip(center.j.checked_add(dj))
                .map(|(i, j)| CellCoord::new(i, j));
            let cell = match coord {
                None => String::new(),
                Some(coord) if coord == center => "@".to_string(),
                Some(coord) => match engine.cell_value(coord) {
                    0 => ".".to_string(),
                    value => value.to_string(),
                },
            };
            row.push_str(&format!("{cell:>4}"));
        }
        rows.push(row);
    }
    rows
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use gridmerge::movement::ManualLocation;
    use gridmerge::save_store::MemoryKeyValueStore;

    use super::*;

    fn engine_at(i: i32, j: i32) -> GameEngine {
        let store = MemoryKeyValueStore::new();
        store.insert(
            SAVE_KEY,
            &format!(
                r#"{{"version":1,"player":{{"i":{i},"j":{j}}},"held":null,"overrides":[]}}"#
            ),
        );
        GameEngine::start(
            GameConfig::default(),
            Box::new(store),
            Box::new(ManualLocation::new()),
        )
    }

    #[test]
    fn map_marks_player_in_the_middle() {
        let engine = engine_at(0, 0);
        let rows = map_rows(&engine, 2);
        assert_eq!(rows.len(), 5);
        assert_eq!(&rows[2][8..12], "   @");
    }

    #[test]
    fn map_at_grid_edge_leaves_outside_cells_blank() {
        let engine = engine_at(i32::MAX, i32::MIN);
        assert_eq!(engine.player().position, CellCoord::new(i32::MAX, i32::MIN));
        let rows = map_rows(&engine, 2);
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].trim(), "");
        assert_eq!(rows[1].trim(), "");
        assert!(rows[2].contains('@'));
        assert!(rows[2].starts_with("        "));
    }
}
