//! Parameter-name routing.
//!
//! Every parameter name the unit is known to emit has an entry in [`ROUTES`].
//! Names with no state effect are still listed, as [`Route::Ignored`], so a
//! future firmware message is distinguishable from one we chose to drop.

use std::collections::HashMap;

/// Parameters owned by a level control point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelParam {
    Gain,
    Mute,
    MinGain,
    MaxGain,
    /// `MINMAX <min> <max>`, both bounds in one reply
    MinMax,
}

/// Parameters owned by a dialer line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialerParam {
    /// `HOOK` / `KEY_HOOK` with `0|1`
    Hook,
    /// `STATE_CHANGE`, `INDICATION`, `ACTIVE_PARTIES` payloads
    CallStatus,
    IncomingCall,
    AutoAnswer,
    AutoAnswerRings,
    CallerId,
    LocalNumber,
    DoNotDisturb,
    /// TELCO echo of the DND setting (`RING_ENABLE 0` means DND on)
    RingEnable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Level(LevelParam),
    Dialer(DialerParam),
    /// Heartbeat answer (`BOX <name> UNIT SN <serial>`)
    Heartbeat,
    /// Error notification carried as a parameter
    DeviceError,
    /// Recognized, deliberately no state change
    Ignored,
    /// Not in the table
    Unhandled,
}

/// Static parameter table.
pub static ROUTES: &[(&str, Route)] = &[
    ("GAIN", Route::Level(LevelParam::Gain)),
    ("MUTE", Route::Level(LevelParam::Mute)),
    ("MIN_GAIN", Route::Level(LevelParam::MinGain)),
    ("MAX_GAIN", Route::Level(LevelParam::MaxGain)),
    ("MINMAX", Route::Level(LevelParam::MinMax)),
    ("HOOK", Route::Dialer(DialerParam::Hook)),
    ("KEY_HOOK", Route::Dialer(DialerParam::Hook)),
    ("STATE_CHANGE", Route::Dialer(DialerParam::CallStatus)),
    ("INDICATION", Route::Dialer(DialerParam::CallStatus)),
    ("ACTIVE_PARTIES", Route::Dialer(DialerParam::CallStatus)),
    ("INCOMING_CALL", Route::Dialer(DialerParam::IncomingCall)),
    ("AUTO_ANSWER", Route::Dialer(DialerParam::AutoAnswer)),
    ("AUTO_ANSWER_RINGS", Route::Dialer(DialerParam::AutoAnswerRings)),
    ("CALLER_ID", Route::Dialer(DialerParam::CallerId)),
    ("LOCAL_NUMBER", Route::Dialer(DialerParam::LocalNumber)),
    ("KEY_DO_NOT_DISTURB", Route::Dialer(DialerParam::DoNotDisturb)),
    ("RING_ENABLE", Route::Dialer(DialerParam::RingEnable)),
    ("SN", Route::Heartbeat),
    ("ERROR", Route::DeviceError),
    ("RING", Route::Ignored),
    ("KEY_CALL", Route::Ignored),
    ("KEY_HOOK_FLASH", Route::Ignored),
    ("KEY_REDIAL", Route::Ignored),
    ("KEY_REJECT", Route::Ignored),
    ("KEY_DIGIT_PRESSED", Route::Ignored),
    ("KEY_DIGIT_RELEASED", Route::Ignored),
    ("DIGITS_DIALED_SINCE_OFF_HOOK", Route::Ignored),
    ("AUTO_DISCONNECT_MODE", Route::Ignored),
    ("REG_FAILED", Route::Ignored),
    ("REG_SUCCEED", Route::Ignored),
];

/// Lookup table built from [`ROUTES`] plus per-installation level parameters.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: HashMap<String, Route>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteTable {
    pub fn new() -> Self {
        Self {
            routes: ROUTES
                .iter()
                .map(|(name, route)| ((*name).to_string(), *route))
                .collect(),
        }
    }

    /// Route a custom level/mute parameter name to a level handler.
    ///
    /// Names already routed elsewhere keep their route.
    pub fn add_level_parameter(&mut self, name: &str, param: LevelParam) {
        match self.routes.get(name) {
            None => {
                self.routes.insert(name.to_string(), Route::Level(param));
            }
            Some(Route::Level(existing)) if *existing == param => {}
            Some(existing) => {
                tracing::warn!(
                    parameter = name,
                    ?existing,
                    "custom level parameter collides with a routed name, keeping existing route"
                );
            }
        }
    }

    pub fn lookup(&self, parameter: &str) -> Route {
        self.routes
            .get(parameter)
            .copied()
            .unwrap_or(Route::Unhandled)
    }
}
