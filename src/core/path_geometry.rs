//! SVG path geometry parsing.
//!
//! Chart traces and axis lines arrive as `d` attribute strings. Two readings
//! are provided: a flat numeric token list (enough for two-point axis lines)
//! and a command-aware walk that yields only segment anchor points, so curve
//! control points of spline traces never leak into the data.

use std::sync::LazyLock;

use regex::Regex;
use smallvec::SmallVec;

use crate::core::types::{PixelExtents, PixelPoint};
use crate::error::{ExtractError, ExtractResult};

static TRANSLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"translate\(\s*([-+0-9.eE]+)(?:[\s,]+([-+0-9.eE]+))?\s*\)")
        .expect("translate pattern is valid")
});

#[derive(Debug, Clone, PartialEq)]
struct PathCommand {
    letter: char,
    args: SmallVec<[f64; 8]>,
}

/// Scans a path string into commands with their numeric arguments.
fn tokenize(d: &str) -> ExtractResult<Vec<PathCommand>> {
    let mut commands: Vec<PathCommand> = Vec::new();
    let chars: Vec<char> = d.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_alphabetic() && c != 'e' && c != 'E' {
            commands.push(PathCommand {
                letter: c,
                args: SmallVec::new(),
            });
            i += 1;
        } else if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() {
            let start = i;
            let mut seen_dot = c == '.';
            let mut seen_exp = false;
            i += 1;
            while i < chars.len() {
                let n = chars[i];
                if n.is_ascii_digit() {
                    i += 1;
                } else if n == '.' && !seen_dot && !seen_exp {
                    seen_dot = true;
                    i += 1;
                } else if (n == 'e' || n == 'E') && !seen_exp {
                    seen_exp = true;
                    i += 1;
                    if i < chars.len() && (chars[i] == '-' || chars[i] == '+') {
                        i += 1;
                    }
                } else {
                    break;
                }
            }
            let text: String = chars[start..i].iter().collect();
            let value: f64 = text
                .parse()
                .map_err(|_| ExtractError::Parse(format!("invalid path number `{text}`")))?;
            match commands.last_mut() {
                Some(command) => command.args.push(value),
                None => {
                    return Err(ExtractError::Parse(
                        "path data must start with a command".to_owned(),
                    ));
                }
            }
        } else if c.is_whitespace() || c == ',' {
            i += 1;
        } else {
            return Err(ExtractError::Parse(format!(
                "unexpected character `{c}` in path data"
            )));
        }
    }

    Ok(commands)
}

/// Every number in the path, commands ignored.
pub fn flat_tokens(d: &str) -> ExtractResult<Vec<f64>> {
    Ok(tokenize(d)?
        .into_iter()
        .flat_map(|command| command.args.into_iter())
        .collect())
}

fn group_arity(letter: char) -> ExtractResult<usize> {
    match letter.to_ascii_uppercase() {
        'M' | 'L' | 'T' => Ok(2),
        'H' | 'V' => Ok(1),
        'S' | 'Q' => Ok(4),
        'C' => Ok(6),
        'A' => Ok(7),
        'Z' => Ok(0),
        other => Err(ExtractError::Parse(format!(
            "unsupported path command `{other}`"
        ))),
    }
}

/// Walks path commands and returns the anchor (end) point of every segment
/// in absolute coordinates, in drawing order.
pub fn anchor_points(d: &str) -> ExtractResult<Vec<PixelPoint>> {
    let mut anchors = Vec::new();
    let mut current = PixelPoint::new(0.0, 0.0);
    let mut subpath_start = current;

    for command in tokenize(d)? {
        let arity = group_arity(command.letter)?;
        let relative = command.letter.is_ascii_lowercase();
        let upper = command.letter.to_ascii_uppercase();

        if arity == 0 {
            current = subpath_start;
            continue;
        }
        if command.args.is_empty() || command.args.len() % arity != 0 {
            return Err(ExtractError::Parse(format!(
                "path command `{}` expects multiples of {arity} numbers, got {}",
                command.letter,
                command.args.len()
            )));
        }

        for (group_index, group) in command.args.chunks(arity).enumerate() {
            let (base_x, base_y) = if relative {
                (current.x, current.y)
            } else {
                (0.0, 0.0)
            };
            let next = match upper {
                'H' => PixelPoint::new(base_x + group[0], current.y),
                'V' => PixelPoint::new(current.x, base_y + group[0]),
                _ => PixelPoint::new(base_x + group[arity - 2], base_y + group[arity - 1]),
            };
            if upper == 'M' && group_index == 0 {
                subpath_start = next;
            }
            anchors.push(next);
            current = next;
        }
    }

    Ok(anchors)
}

/// Sorts points by x and drops later duplicates of an x already seen.
///
/// The sort is stable, so among equal x the point drawn first wins.
#[must_use]
pub fn sort_dedup_by_x(mut points: Vec<PixelPoint>) -> Vec<PixelPoint> {
    points.retain(|point| point.is_finite());
    points.sort_by(|lhs, rhs| lhs.x.total_cmp(&rhs.x));
    points.dedup_by(|later, earlier| later.x == earlier.x);
    points
}

/// Reads the `translate(x, y)` part of an SVG transform attribute.
#[must_use]
pub fn parse_translate(transform: &str) -> (f64, f64) {
    TRANSLATE
        .captures(transform)
        .map(|captures| {
            let tx = captures
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0.0);
            let ty = captures
                .get(2)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0.0);
            (tx, ty)
        })
        .unwrap_or((0.0, 0.0))
}

/// Endpoints of an axis line path projected on one coordinate.
///
/// `take_y` selects odd tokens (y coordinates) for a vertical value axis,
/// otherwise even tokens (x coordinates).
pub fn axis_line_span(d: &str, take_y: bool) -> ExtractResult<(f64, f64)> {
    let tokens = flat_tokens(d)?;
    let coords: Vec<f64> = tokens
        .iter()
        .copied()
        .skip(usize::from(take_y))
        .step_by(2)
        .collect();
    if coords.len() < 2 {
        return Err(ExtractError::Parse(format!(
            "axis line `{d}` has fewer than two points"
        )));
    }
    let min = coords.iter().copied().fold(f64::INFINITY, f64::min);
    let max = coords.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Ok((min, max))
}

/// Combines value-axis and category-axis line paths into extents.
pub fn axis_extents(y_axis_line: &str, x_axis_line: &str) -> ExtractResult<PixelExtents> {
    let (y_min, y_max) = axis_line_span(y_axis_line, true)?;
    let (x_min, x_max) = axis_line_span(x_axis_line, false)?;
    if y_max <= y_min {
        return Err(ExtractError::InvalidData(
            "value axis line has zero pixel length".to_owned(),
        ));
    }
    Ok(PixelExtents {
        x_min,
        x_max,
        y_min,
        y_max,
    })
}

#[cfg(test)]
mod tests {
    use super::{anchor_points, axis_line_span, flat_tokens, parse_translate, sort_dedup_by_x};
    use crate::core::types::PixelPoint;

    #[test]
    fn flat_tokens_handle_packed_numbers() {
        let tokens = flat_tokens("M10-5L.5.25 1e1,2").expect("tokens");
        assert_eq!(tokens, vec![10.0, -5.0, 0.5, 0.25, 10.0, 2.0]);
    }

    #[test]
    fn spline_control_points_are_not_anchors() {
        let anchors = anchor_points("M 0 10 C 3 9 6 8 10 5 C 13 4 16 3 20 0").expect("anchors");
        assert_eq!(
            anchors,
            vec![
                PixelPoint::new(0.0, 10.0),
                PixelPoint::new(10.0, 5.0),
                PixelPoint::new(20.0, 0.0)
            ]
        );
    }

    #[test]
    fn relative_and_axis_commands_resolve_absolutely() {
        let anchors = anchor_points("M 5 5 l 5 0 h 5 v -2 L 30 1 z").expect("anchors");
        assert_eq!(
            anchors,
            vec![
                PixelPoint::new(5.0, 5.0),
                PixelPoint::new(10.0, 5.0),
                PixelPoint::new(15.0, 5.0),
                PixelPoint::new(15.0, 3.0),
                PixelPoint::new(30.0, 1.0),
            ]
        );
    }

    #[test]
    fn implicit_lineto_after_moveto_is_anchored() {
        let anchors = anchor_points("M 0 0 1 1 2 4").expect("anchors");
        assert_eq!(anchors.len(), 3);
        assert_eq!(anchors[2], PixelPoint::new(2.0, 4.0));
    }

    #[test]
    fn malformed_paths_are_rejected() {
        assert!(anchor_points("10 10 L 5 5").is_err());
        assert!(anchor_points("M 0 0 C 1 2 3").is_err());
        assert!(anchor_points("M 0 0 X 1 2").is_err());
    }

    #[test]
    fn dedup_keeps_first_drawn_point_per_x() {
        let points = vec![
            PixelPoint::new(2.0, 7.0),
            PixelPoint::new(1.0, 3.0),
            PixelPoint::new(2.0, 9.0),
        ];
        let sorted = sort_dedup_by_x(points);
        assert_eq!(sorted, vec![PixelPoint::new(1.0, 3.0), PixelPoint::new(2.0, 7.0)]);
    }

    #[test]
    fn translate_parses_one_or_two_components() {
        assert_eq!(parse_translate("translate(50,40) scale(1 1)"), (50.0, 40.0));
        assert_eq!(parse_translate("translate(12.5)"), (12.5, 0.0));
        assert_eq!(parse_translate("scale(2)"), (0.0, 0.0));
    }

    #[test]
    fn axis_line_span_reads_the_requested_coordinate() {
        assert_eq!(axis_line_span("M 650 60 L 650 360", true).expect("y"), (60.0, 360.0));
        assert_eq!(axis_line_span("M 50 360 L 650 360", false).expect("x"), (50.0, 650.0));
    }
}
