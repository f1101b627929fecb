use crate::types::{CellCoord, Direction, LatLng, MovementMode};

#[derive(Clone, Debug, PartialEq)]
pub enum ParsedCommand {
    Move { dir: Direction },
    Click { coord: CellCoord },
    Location { point: LatLng },
    Mode { mode: MovementMode },
    View { north_west: LatLng, south_east: LatLng },
    Reset,
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  n | s | e | w | move <dir>      step one cell (button mode)
  click <i> <j>                   interact with a cell
  loc <lat> <lng>                 feed a location sample (geolocation mode)
  mode button|geo                 switch movement source
  view <lat1> <lng1> <lat2> <lng2> report new map corners
  reset                           start a new game
  status | help | quit";

pub fn parse_command(raw: &str) -> Option<ParsedCommand> {
    let lowered = raw.trim().to_ascii_lowercase();
    let mut parts = lowered.split_whitespace();
    let head = parts.next()?;
    let args: Vec<&str> = parts.collect();

    let command = match head {
        "move" | "go" => {
            let [dir] = args.as_slice() else {
                return None;
            };
            ParsedCommand::Move {
                dir: Direction::parse(dir)?,
            }
        }
        "click" => {
            let [i, j] = args.as_slice() else {
                return None;
            };
            ParsedCommand::Click {
                coord: CellCoord::new(i.parse().ok()?, j.parse().ok()?),
            }
        }
        "loc" | "location" => {
            let [lat, lng] = args.as_slice() else {
                return None;
            };
            ParsedCommand::Location {
                point: parse_lat_lng(lat, lng)?,
            }
        }
        "mode" => {
            let [mode] = args.as_slice() else {
                return None;
            };
            ParsedCommand::Mode {
                mode: MovementMode::parse(mode)?,
            }
        }
        "view" => {
            let [lat1, lng1, lat2, lng2] = args.as_slice() else {
                return None;
            };
            ParsedCommand::View {
                north_west: parse_lat_lng(lat1, lng1)?,
                south_east: parse_lat_lng(lat2, lng2)?,
            }
        }
        "reset" if args.is_empty() => ParsedCommand::Reset,
        "status" if args.is_empty() => ParsedCommand::Status,
        "help" | "?" => ParsedCommand::Help,
        "quit" | "exit" | "q" => ParsedCommand::Quit,
        other if args.is_empty() => ParsedCommand::Move {
            dir: Direction::parse(other)?,
        },
        _ => return None,
    };
    Some(command)
}

fn parse_lat_lng(lat: &str, lng: &str) -> Option<LatLng> {
    let point = LatLng::new(lat.parse().ok()?, lng.parse().ok()?);
    point.is_finite().then_some(point)
}
