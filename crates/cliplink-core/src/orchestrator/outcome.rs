use serde::Serialize;

use crate::location::Location;
use crate::resolve::ResolutionSource;
use crate::session::ResourceRef;

/// What became of one navigation, in the order the tasks finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NavigationOutcome {
    Applied {
        location: Location,
        resource: ResourceRef,
        source: ResolutionSource,
    },
    /// Resolved, but the user had moved on before the link went in.
    Abandoned {
        location: Location,
        resource: ResourceRef,
    },
    /// Superseded by a newer navigation or stopped by shutdown.
    Cancelled { location: Location },
    Failed { location: Location, error: String },
}

impl NavigationOutcome {
    pub fn location(&self) -> &Location {
        match self {
            NavigationOutcome::Applied { location, .. }
            | NavigationOutcome::Abandoned { location, .. }
            | NavigationOutcome::Cancelled { location }
            | NavigationOutcome::Failed { location, .. } => location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_outcome_tag() {
        let applied = NavigationOutcome::Applied {
            location: "/a/clip/x".into(),
            resource: "cdn://clip1".into(),
            source: ResolutionSource::Cache,
        };
        let json = serde_json::to_value(&applied).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "outcome": "applied",
                "location": "/a/clip/x",
                "resource": "cdn://clip1",
                "source": "cache",
            })
        );

        let failed = NavigationOutcome::Failed {
            location: "/a/clip/y".into(),
            error: "boom".into(),
        };
        assert_eq!(serde_json::to_value(&failed).unwrap()["outcome"], "failed");
        assert_eq!(failed.location().as_str(), "/a/clip/y");
    }
}
