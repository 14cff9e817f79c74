//! # Typed state enumerations for enum channels.
//!
//! Hardware state channels publish an *index* into a label table
//! (`["Idle", "Infusing", "Withdrawing", "Interrupted"]`). Devices do not
//! compare strings at notification time; they build a [`StateTable`] once, at
//! setup, and decode every notification into their own enum.
//!
//! ## Validation (fail fast)
//! - every non-empty hardware label must parse into a known state,
//! - every state listed in [`StateLabel::REQUIRED`] must be present.
//!
//! Empty labels are treated as unused slots.

use std::fmt;

use crate::error::SignalError;
use crate::signal::channel::Signal;
use crate::signal::value::{Notification, Value};

/// A device-side state enumeration that can be decoded from hardware labels.
pub trait StateLabel: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// States the device logic depends on; each must appear in the table.
    const REQUIRED: &'static [Self];

    /// Parses a hardware label.
    fn from_label(label: &str) -> Option<Self>;

    /// Canonical label.
    fn label(self) -> &'static str;
}

/// Index → state mapping for one enum channel, validated at construction.
#[derive(Clone, Debug)]
pub struct StateTable<S: StateLabel> {
    channel: String,
    states: Vec<Option<S>>,
}

impl<S: StateLabel> StateTable<S> {
    /// Builds the table from a channel's label list.
    pub fn from_signal(signal: &dyn Signal) -> Result<Self, SignalError> {
        let labels = signal.enum_labels().ok_or_else(|| SignalError::NotEnum {
            channel: signal.name().to_string(),
        })?;
        Self::from_labels(signal.name(), &labels)
    }

    /// Builds the table from an explicit label list.
    pub fn from_labels<L: AsRef<str>>(channel: &str, labels: &[L]) -> Result<Self, SignalError> {
        let mut states = Vec::with_capacity(labels.len());
        for label in labels {
            let label = label.as_ref().trim();
            if label.is_empty() {
                states.push(None);
                continue;
            }
            match S::from_label(label) {
                Some(state) => states.push(Some(state)),
                None => {
                    return Err(SignalError::UnknownLabel {
                        channel: channel.to_string(),
                        label: label.to_string(),
                    });
                }
            }
        }

        for required in S::REQUIRED {
            if !states.contains(&Some(*required)) {
                return Err(SignalError::MissingVariant {
                    channel: channel.to_string(),
                    state: required.label(),
                });
            }
        }

        Ok(Self {
            channel: channel.to_string(),
            states,
        })
    }

    /// Channel this table was built for.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Decodes one raw value.
    ///
    /// Text values are accepted as labels (channels read in string mode).
    pub fn decode(&self, value: &Value) -> Result<S, SignalError> {
        if let Value::Text(text) = value {
            if let Some(state) = S::from_label(text.trim()) {
                return Ok(state);
            }
        }
        value
            .as_index()
            .and_then(|i| self.states.get(i).copied().flatten())
            .ok_or_else(|| SignalError::BadIndex {
                channel: self.channel.clone(),
                value: value.to_string(),
            })
    }

    /// Decodes `(old, new)` of a notification.
    pub fn decode_change(&self, note: &Notification) -> Result<(S, S), SignalError> {
        Ok((self.decode(&note.old)?, self.decode(&note.new)?))
    }

    /// Index of `state` in the hardware table.
    pub fn index_of(&self, state: S) -> Option<usize> {
        self.states.iter().position(|s| *s == Some(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Door {
        Open,
        Closed,
    }

    impl StateLabel for Door {
        const REQUIRED: &'static [Self] = &[Door::Open, Door::Closed];

        fn from_label(label: &str) -> Option<Self> {
            match label {
                "Open" => Some(Door::Open),
                "Closed" => Some(Door::Closed),
                _ => None,
            }
        }

        fn label(self) -> &'static str {
            match self {
                Door::Open => "Open",
                Door::Closed => "Closed",
            }
        }
    }

    #[test]
    fn test_decodes_indices_and_labels() {
        let table = StateTable::<Door>::from_labels("door", &["Closed", "", "Open"]).unwrap();
        assert_eq!(table.decode(&Value::Int(0)).unwrap(), Door::Closed);
        assert_eq!(table.decode(&Value::Int(2)).unwrap(), Door::Open);
        assert_eq!(table.decode(&Value::from("Open")).unwrap(), Door::Open);
        assert_eq!(table.index_of(Door::Open), Some(2));
    }

    #[test]
    fn test_unused_or_out_of_range_index_is_rejected() {
        let table = StateTable::<Door>::from_labels("door", &["Closed", "", "Open"]).unwrap();
        let err = table.decode(&Value::Int(1)).unwrap_err();
        assert_eq!(err.as_label(), "signal_bad_index");
        assert!(table.decode(&Value::Int(7)).is_err());
    }

    #[test]
    fn test_unknown_label_fails_fast() {
        let err = StateTable::<Door>::from_labels("door", &["Open", "Closed", "Ajar"]).unwrap_err();
        assert_eq!(
            err,
            SignalError::UnknownLabel {
                channel: "door".into(),
                label: "Ajar".into()
            }
        );
    }

    #[test]
    fn test_missing_required_state_fails_fast() {
        let err = StateTable::<Door>::from_labels("door", &["Open"]).unwrap_err();
        assert_eq!(err.as_label(), "signal_missing_variant");
    }
}
