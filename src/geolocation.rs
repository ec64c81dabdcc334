//! Single-shot user location requests.
//!
//! A request is a oneshot channel: whoever can see the user's position (a
//! browser bridge, a CLI flag, a test) fulfils the [`LocationResponder`] once,
//! and the caller awaits the [`PendingLocation`].

use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;

use crate::models::Coordinate;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("location permission denied")]
    Denied,
    #[error("location request timed out")]
    Timeout,
    #[error("location unavailable")]
    Unavailable,
    #[error("invalid coordinate: {0}")]
    Invalid(String),
}

impl LocationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            LocationError::Denied => {
                "Standortfreigabe verweigert. Der Umkreisfilter ist deaktiviert."
            }
            LocationError::Timeout => {
                "Standort konnte nicht rechtzeitig ermittelt werden. Der Umkreisfilter ist deaktiviert."
            }
            LocationError::Unavailable | LocationError::Invalid(_) => {
                "Standort nicht verfügbar. Der Umkreisfilter ist deaktiviert."
            }
        }
    }
}

pub type LocationResult = Result<Coordinate, LocationError>;

pub struct LocationResponder {
    tx: oneshot::Sender<LocationResult>,
}

impl LocationResponder {
    pub fn resolve(self, result: LocationResult) {
        let result = result.and_then(|coord| {
            if coord.is_valid() {
                Ok(coord)
            } else {
                Err(LocationError::Invalid(format!("{}, {}", coord.lat, coord.lng)))
            }
        });
        if self.tx.send(result).is_err() {
            tracing::debug!("location result arrived after the request was dropped");
        }
    }
}

pub struct PendingLocation {
    rx: oneshot::Receiver<LocationResult>,
}

impl PendingLocation {
    pub async fn wait(self, timeout: Duration) -> LocationResult {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(LocationError::Unavailable),
            Err(_) => Err(LocationError::Timeout),
        }
    }
}

pub fn request() -> (LocationResponder, PendingLocation) {
    let (tx, rx) = oneshot::channel();
    (LocationResponder { tx }, PendingLocation { rx })
}

/// First location outcome of the session. Later results are ignored.
#[derive(Debug, Default)]
pub struct LocationCache {
    outcome: Option<LocationResult>,
}

impl LocationCache {
    /// Stores `result` if nothing is cached yet and returns the cached outcome.
    pub fn settle(&mut self, result: LocationResult) -> &LocationResult {
        if self.outcome.is_some() {
            tracing::debug!("location already settled for this session");
        } else {
            match &result {
                Ok(coord) => tracing::info!(lat = coord.lat, lng = coord.lng, "user location set"),
                Err(err) => tracing::warn!("user location failed: {err}"),
            }
        }
        self.outcome.get_or_insert(result)
    }

    pub fn location(&self) -> Option<Coordinate> {
        match &self.outcome {
            Some(Ok(coord)) => Some(*coord),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&LocationError> {
        match &self.outcome {
            Some(Err(err)) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_with_coordinate() {
        let (responder, pending) = request();
        tokio::spawn(async move {
            responder.resolve(Ok(Coordinate::new(50.3197, 11.9168)));
        });
        let coord = pending.wait(DEFAULT_TIMEOUT).await.expect("coordinate");
        assert_eq!(coord, Coordinate::new(50.3197, 11.9168));
    }

    #[tokio::test]
    async fn propagates_denial() {
        let (responder, pending) = request();
        responder.resolve(Err(LocationError::Denied));
        assert_eq!(pending.wait(DEFAULT_TIMEOUT).await, Err(LocationError::Denied));
    }

    #[tokio::test]
    async fn dropped_responder_is_unavailable() {
        let (responder, pending) = request();
        drop(responder);
        assert_eq!(
            pending.wait(DEFAULT_TIMEOUT).await,
            Err(LocationError::Unavailable)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn silent_responder_times_out() {
        let (_responder, pending) = request();
        assert_eq!(
            pending.wait(Duration::from_secs(5)).await,
            Err(LocationError::Timeout)
        );
    }

    #[tokio::test]
    async fn rejects_out_of_range_coordinate() {
        let (responder, pending) = request();
        responder.resolve(Ok(Coordinate::new(123.0, 0.0)));
        assert!(matches!(
            pending.wait(DEFAULT_TIMEOUT).await,
            Err(LocationError::Invalid(_))
        ));
    }

    #[test]
    fn cache_keeps_first_outcome() {
        let mut cache = LocationCache::default();
        assert_eq!(cache.location(), None);
        cache.settle(Err(LocationError::Denied));
        cache.settle(Ok(Coordinate::new(1.0, 2.0)));
        assert_eq!(cache.location(), None);
        assert_eq!(cache.error(), Some(&LocationError::Denied));
        assert!(cache.error().unwrap().user_message().contains("Umkreisfilter"));
    }
}
