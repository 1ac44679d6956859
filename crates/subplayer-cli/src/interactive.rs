//! Line commands accepted by `subplayer-cli play`.

/// One interactive command.
#[derive(Debug, Clone, PartialEq)]
pub enum Interactive {
    Play,
    Pause,
    Seek(f64),
    /// Rewind by the given seconds, or the configured step
    Rewind(Option<f64>),
    /// Forward by the given seconds, or the configured step
    Forward(Option<f64>),
    Frame(i64),
    Position,
    Info,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ParseError(String);

pub const HELP: &str = "commands: play | pause | seek <sec> | rw [sec] | ff [sec] | frame <n> | pos | info | help | quit";

impl Interactive {
    /// Parses one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let arg = words.next();
        if words.next().is_some() {
            return Err(ParseError(format!("too many arguments for '{}'", verb)));
        }

        let command = match verb.to_ascii_lowercase().as_str() {
            "play" | "p" => Interactive::Play,
            "pause" | "space" => Interactive::Pause,
            "seek" | "s" => Interactive::Seek(required(verb, arg)?),
            "rw" | "rewind" => Interactive::Rewind(optional(verb, arg)?),
            "ff" | "forward" => Interactive::Forward(optional(verb, arg)?),
            "frame" | "f" => {
                let value = arg.ok_or_else(|| ParseError("frame needs a frame number".to_string()))?;
                let frame = value
                    .parse::<i64>()
                    .map_err(|_| ParseError(format!("'{}' is not a frame number", value)))?;
                Interactive::Frame(frame)
            }
            "pos" | "position" => Interactive::Position,
            "info" => Interactive::Info,
            "help" | "?" => Interactive::Help,
            "quit" | "q" | "exit" => Interactive::Quit,
            other => return Err(ParseError(format!("unknown command '{}'", other))),
        };
        Ok(Some(command))
    }
}

fn parse_seconds(verb: &str, value: &str) -> Result<f64, ParseError> {
    match value.parse::<f64>() {
        Ok(secs) if secs.is_finite() => Ok(secs),
        _ => Err(ParseError(format!("{}: '{}' is not a number of seconds", verb, value))),
    }
}

fn required(verb: &str, arg: Option<&str>) -> Result<f64, ParseError> {
    let value = arg.ok_or_else(|| ParseError(format!("{} needs a time in seconds", verb)))?;
    parse_seconds(verb, value)
}

fn optional(verb: &str, arg: Option<&str>) -> Result<Option<f64>, ParseError> {
    arg.map(|value| parse_seconds(verb, value)).transpose()
}
