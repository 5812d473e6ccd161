//! Line commands accepted on stdin by `watch`.

use std::str::FromStr;

use floodwatch_feed_models::{Feed, GeoCoordinate};
use floodwatch_map::RiskFilter;
use thiserror::Error;

pub const HELP: &str = "\
commands:
  hide | show             simulate the view leaving or entering the screen
  refresh [feed]          refresh every feed, or one of floodRisk, weather, communityUpdates
  filter <tier>           all, high, medium, low
  goto <lat> <lng>        report a new live position
  hover <lat> <lng>       inspect the zone under a point
  summary                 print the dashboard now
  quit";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WatchCommand {
    Hide,
    Show,
    Refresh(Option<Feed>),
    Filter(RiskFilter),
    Goto(GeoCoordinate),
    Hover(GeoCoordinate),
    Summary,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Unknown command: {0} (try `help`)")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("{0}")]
    Invalid(String),
}

impl FromStr for WatchCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(Self::Summary);
        };
        let args: Vec<&str> = words.collect();

        match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("hide", []) => Ok(Self::Hide),
            ("show", []) => Ok(Self::Show),
            ("refresh", []) => Ok(Self::Refresh(None)),
            ("refresh", [feed]) => feed
                .parse::<Feed>()
                .map(|feed| Self::Refresh(Some(feed)))
                .map_err(|_| CommandError::Invalid(format!("Unknown feed: {feed}"))),
            ("filter", [tier]) => tier
                .to_ascii_lowercase()
                .parse::<RiskFilter>()
                .map(Self::Filter)
                .map_err(|_| CommandError::Invalid(format!("Unknown risk tier: {tier}"))),
            ("filter", _) => Err(CommandError::Usage("filter <all|high|medium|low>")),
            ("goto", [lat, lng]) => coordinate(lat, lng).map(Self::Goto),
            ("goto", _) => Err(CommandError::Usage("goto <lat> <lng>")),
            ("hover", [lat, lng]) => coordinate(lat, lng).map(Self::Hover),
            ("hover", _) => Err(CommandError::Usage("hover <lat> <lng>")),
            ("summary" | "status", []) => Ok(Self::Summary),
            ("help" | "?", _) => Ok(Self::Help),
            ("quit" | "exit" | "q", []) => Ok(Self::Quit),
            _ => Err(CommandError::Unknown(line.trim().to_string())),
        }
    }
}

fn coordinate(lat: &str, lng: &str) -> Result<GeoCoordinate, CommandError> {
    let parse = |raw: &str| {
        raw.parse::<f64>()
            .map_err(|_| CommandError::Invalid(format!("Not a number: {raw}")))
    };
    GeoCoordinate::new(parse(lat)?, parse(lng)?).map_err(|e| CommandError::Invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_visibility_and_quit() {
        assert_eq!("hide".parse::<WatchCommand>(), Ok(WatchCommand::Hide));
        assert_eq!("  SHOW ".parse::<WatchCommand>(), Ok(WatchCommand::Show));
        assert_eq!("q".parse::<WatchCommand>(), Ok(WatchCommand::Quit));
        assert_eq!("".parse::<WatchCommand>(), Ok(WatchCommand::Summary));
    }

    #[test]
    fn parses_refresh_targets() {
        assert_eq!("refresh".parse::<WatchCommand>(), Ok(WatchCommand::Refresh(None)));
        assert_eq!(
            "refresh weather".parse::<WatchCommand>(),
            Ok(WatchCommand::Refresh(Some(Feed::Weather)))
        );
        assert_eq!(
            "refresh communityUpdates".parse::<WatchCommand>(),
            Ok(WatchCommand::Refresh(Some(Feed::CommunityUpdates)))
        );
        assert!(matches!(
            "refresh tides".parse::<WatchCommand>(),
            Err(CommandError::Invalid(_))
        ));
    }

    #[test]
    fn parses_filters_case_insensitively() {
        assert_eq!(
            "filter High".parse::<WatchCommand>(),
            Ok(WatchCommand::Filter(RiskFilter::High))
        );
        assert_eq!("filter all".parse::<WatchCommand>(), Ok(WatchCommand::Filter(RiskFilter::All)));
        assert_eq!(
            "filter".parse::<WatchCommand>(),
            Err(CommandError::Usage("filter <all|high|medium|low>"))
        );
    }

    #[test]
    fn parses_and_validates_coordinates() {
        let WatchCommand::Goto(at) = "goto 22.5726 88.3639".parse::<WatchCommand>().unwrap() else {
            panic!("expected goto");
        };
        assert!((at.latitude() - 22.5726).abs() < 1e-9);
        assert!((at.longitude() - 88.3639).abs() < 1e-9);

        assert!(matches!(
            "goto north 88".parse::<WatchCommand>(),
            Err(CommandError::Invalid(_))
        ));
        assert!(matches!(
            "hover 91 0".parse::<WatchCommand>(),
            Err(CommandError::Invalid(_))
        ));
        assert_eq!(
            "goto 1".parse::<WatchCommand>(),
            Err(CommandError::Usage("goto <lat> <lng>"))
        );
    }

    #[test]
    fn rejects_unknown_verbs() {
        assert_eq!(
            "evacuate now".parse::<WatchCommand>(),
            Err(CommandError::Unknown("evacuate now".to_string()))
        );
    }
}
