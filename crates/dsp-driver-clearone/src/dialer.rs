//! Telephone and VoIP lines.
//!
//! A [`DialerLine`] tracks hook, incoming-call, DND, auto-answer, caller id
//! and local number as reported by the unit, plus a locally edited dial string.
//!
//! Call status arrives as free-text payloads on three parameters
//! (`STATE_CHANGE`, `INDICATION`, `ACTIVE_PARTIES`) that all go through
//! [`classify_call_status`]. An incoming indicator wins over everything else in
//! the same payload: ringing lines often also carry `IDLE`/`OFF` tokens that
//! would otherwise read as on-hook.
//!
//! TELCO and VoIP lines speak different verbs for the same operations; those
//! live in [`TelcoLine`] and [`VoipLine`] behind [`LineProtocol`].

use crate::config::{DialerConfig, TimingSettings};
use crate::response::ResponseLine;
use crate::router::DialerParam;
use crate::state::{Confirmed, Local};
use crate::tokenizer::{tokenize, unquote};
use crate::transmitter::CommandTransmitter;
use dsp_core::capabilities::{Dialer, KeypadKey};
use enum_dispatch::enum_dispatch;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

// =============================================================================
// Call status classification
// =============================================================================

/// Tokens meaning a call is being offered.
pub const INCOMING_TOKENS: &[&str] = &["INCOMING", "INCOMING_CALL", "PARTY_LINE:BLINK"];

/// Tokens meaning the line is idle.
pub const ON_HOOK_TOKENS: &[&str] = &["UNKNOWN", "IDLE", "OFF", "PARTY_LINE:OFF", "WARNING_ERR:OFF"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallStatus {
    /// Incoming indicator present; `caller` from `INCOMING:"<number>"`
    Incoming { caller: Option<String> },
    OnHook,
    /// No on-hook token: anything unrecognized counts as an active call
    OffHook,
    /// Nothing to classify (e.g. a subscription echo)
    Empty,
}

/// `word` is `entry` or `entry:<detail>`.
fn word_matches(word: &str, entry: &str) -> bool {
    word == entry
        || word
            .strip_prefix(entry)
            .is_some_and(|rest| rest.starts_with(':'))
}

fn caller_from_incoming(word: &str) -> Option<String> {
    let (head, number) = word.split_once(':')?;
    if head != "INCOMING" {
        return None;
    }
    let number = unquote(number).trim();
    (!number.is_empty()).then(|| number.to_string())
}

/// Classify the `;`-separated sub-tokens of a call status payload.
///
/// Sub-tokens are split into words quote-aware, so `INCOMING:"John Smith"`
/// stays one word.
pub fn classify_call_status(sub_tokens: &[String]) -> CallStatus {
    let words: Vec<String> = sub_tokens.iter().flat_map(|t| tokenize(t, ' ')).collect();

    if words.is_empty() {
        return CallStatus::Empty;
    }

    if let Some(word) = words
        .iter()
        .find(|w| INCOMING_TOKENS.iter().any(|e| word_matches(w, e)))
    {
        return CallStatus::Incoming {
            caller: caller_from_incoming(word),
        };
    }

    let on_hook = words
        .iter()
        .any(|w| ON_HOOK_TOKENS.iter().any(|e| word_matches(w, e)));
    if on_hook {
        CallStatus::OnHook
    } else {
        CallStatus::OffHook
    }
}

/// Pick the number out of a `CALLER_ID` value such as `"John Smith" 5551234`.
pub fn extract_caller_number(value: &str) -> String {
    let tokens = tokenize(value, ' ');
    let is_number = |t: &&String| {
        let t = unquote(t);
        !t.is_empty()
            && t.chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '+' | '*' | '#' | '-'))
    };
    tokens
        .iter()
        .find(is_number)
        .or_else(|| tokens.first())
        .map(|t| unquote(t).to_string())
        .unwrap_or_default()
}

// =============================================================================
// Line protocols
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineMode {
    Voip,
    Telco,
}

/// Mode-specific command verbs. Every method returns complete command lines.
#[enum_dispatch]
pub trait LineProtocol {
    fn mode(&self) -> LineMode;

    fn dial(&self, channel: &str, number: &str) -> String {
        format!("EP {} KEY KEY_CALL {}", channel, number)
    }

    fn hook(&self, channel: &str, off_hook: bool) -> String {
        format!("EP {} KEY KEY_HOOK {}", channel, u8::from(off_hook))
    }

    fn reject(&self, channel: &str) -> String;

    fn do_not_disturb(&self, channel: &str, on: bool) -> String;

    fn auto_answer(&self, channel: &str, on: bool) -> String;

    fn hook_inquiry(&self, channel: &str) -> String;

    /// Status queries beyond the hook inquiry.
    fn extra_polls(&self, channel: &str) -> Vec<String>;

    fn digit_pressed(&self, channel: &str, digit: char) -> String {
        format!("EP {} KEY KEY_DIGIT_PRESSED {}", channel, digit)
    }

    fn digit_released(&self, channel: &str, digit: char) -> String {
        format!("EP {} KEY KEY_DIGIT_RELEASED {}", channel, digit)
    }

    fn digits_dialed_inquiry(&self, channel: &str) -> String {
        format!("EP {} INQUIRE DIGITS_DIALED_SINCE_OFF_HOOK", channel)
    }

    /// Notification registrations; empty when the mode pushes status unasked.
    fn subscriptions(&self, channel: &str) -> Vec<String>;
}

/// Analog telephone interface.
#[derive(Debug, Clone, Copy, Default)]
pub struct TelcoLine;

/// SIP user agent.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoipLine;

/// Notification categories a VoIP line registers for.
pub const VOIP_NOTIFICATIONS: &[&str] = &[
    "STATE_CHANGE",
    "INDICATION",
    "ACTIVE_PARTIES",
    "INCOMING_CALL",
    "CALLER_ID",
    "REG_FAILED",
    "REG_SUCCEED",
];

impl LineProtocol for TelcoLine {
    fn mode(&self) -> LineMode {
        LineMode::Telco
    }

    fn reject(&self, channel: &str) -> String {
        format!("EP {} KEY KEY_REJECT 1", channel)
    }

    fn do_not_disturb(&self, channel: &str, on: bool) -> String {
        // Ringer enabled is the inverse of DND
        format!("EP {} SETTINGS RING_ENABLE {}", channel, u8::from(!on))
    }

    fn auto_answer(&self, channel: &str, on: bool) -> String {
        format!("EP {} SETTINGS AUTO_ANSWER_RINGS {}", channel, u8::from(on))
    }

    fn hook_inquiry(&self, channel: &str) -> String {
        format!("EP {} INQUIRE HOOK", channel)
    }

    fn extra_polls(&self, _channel: &str) -> Vec<String> {
        Vec::new()
    }

    fn subscriptions(&self, _channel: &str) -> Vec<String> {
        Vec::new()
    }
}

impl LineProtocol for VoipLine {
    fn mode(&self) -> LineMode {
        LineMode::Voip
    }

    fn reject(&self, channel: &str) -> String {
        self.hook(channel, false)
    }

    fn do_not_disturb(&self, channel: &str, on: bool) -> String {
        format!("EP {} KEY KEY_DO_NOT_DISTURB {}", channel, u8::from(on))
    }

    fn auto_answer(&self, channel: &str, on: bool) -> String {
        format!("EP {} SETTINGS AUTO_ANSWER {}", channel, u8::from(on))
    }

    fn hook_inquiry(&self, channel: &str) -> String {
        format!("EP {} KEY KEY_HOOK", channel)
    }

    fn extra_polls(&self, channel: &str) -> Vec<String> {
        vec![format!("EP {} KEY KEY_DO_NOT_DISTURB", channel)]
    }

    fn subscriptions(&self, channel: &str) -> Vec<String> {
        VOIP_NOTIFICATIONS
            .iter()
            .map(|category| format!("EP {} NOTIFICATION {}", channel, category))
            .collect()
    }
}

#[enum_dispatch(LineProtocol)]
#[derive(Debug, Clone, Copy)]
pub enum LineKind {
    Voip(VoipLine),
    Telco(TelcoLine),
}

// =============================================================================
// DialerLine
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct KeypadTiming {
    press: Duration,
    poll: Duration,
}

/// One telephone or VoIP line.
pub struct DialerLine {
    key: String,
    label: String,
    channel: String,
    kind: LineKind,
    clear_on_hangup: bool,
    off_hook: Confirmed<bool>,
    incoming_call: Confirmed<bool>,
    auto_answer: Confirmed<bool>,
    do_not_disturb: Confirmed<bool>,
    caller_id_number: Confirmed<String>,
    local_number: Confirmed<String>,
    dial_string: Local<String>,
    transmitter: CommandTransmitter,
    timing: KeypadTiming,
    keypad: Mutex<Option<mpsc::UnboundedSender<char>>>,
    /// Runtime of the attached session, for keypresses from non-runtime threads
    runtime: Mutex<Option<Handle>>,
}

impl std::fmt::Debug for DialerLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialerLine")
            .field("key", &self.key)
            .field("channel", &self.channel)
            .field("mode", &self.kind.mode())
            .field("off_hook", &self.off_hook.get())
            .field("incoming_call", &self.incoming_call.get())
            .finish_non_exhaustive()
    }
}

/// VoIP endpoints configured by bare number address the `UA` endpoint type.
fn voip_channel(channel: String) -> String {
    if !channel.is_empty() && channel.chars().all(|c| c.is_ascii_digit()) {
        format!("UA {}", channel)
    } else {
        channel
    }
}

impl DialerLine {
    pub fn new(
        key: impl Into<String>,
        channel: impl Into<String>,
        config: &DialerConfig,
        timing: &TimingSettings,
        transmitter: CommandTransmitter,
    ) -> Self {
        let key = key.into();
        let channel = channel.into();
        let (kind, channel) = if config.is_voip {
            (LineKind::from(VoipLine), voip_channel(channel))
        } else {
            (LineKind::from(TelcoLine), channel)
        };
        let label = if config.label.is_empty() {
            key.clone()
        } else {
            config.label.clone()
        };
        let name = |field: &str| format!("{}.{}", key, field);
        let describe = |what: &str| format!("{} {}", label, what);

        Self {
            off_hook: Confirmed::new(name("off_hook"), false)
                .with_description(describe("off hook")),
            incoming_call: Confirmed::new(name("incoming_call"), false)
                .with_description(describe("incoming call")),
            auto_answer: Confirmed::new(name("auto_answer"), false)
                .with_description(describe("auto answer")),
            do_not_disturb: Confirmed::new(name("do_not_disturb"), false)
                .with_description(describe("do not disturb")),
            caller_id_number: Confirmed::new(name("caller_id_number"), String::new())
                .with_description(describe("caller id")),
            local_number: Confirmed::new(name("local_number"), String::new())
                .with_description(describe("local number")),
            dial_string: Local::new(name("dial_string"), String::new())
                .with_description(describe("dial string")),
            key,
            label,
            channel,
            kind,
            clear_on_hangup: config.clear_on_hangup,
            transmitter,
            timing: KeypadTiming {
                press: timing.keypad_press(),
                poll: timing.keypad_poll(),
            },
            keypad: Mutex::new(None),
            runtime: Mutex::new(None),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn mode(&self) -> LineMode {
        self.kind.mode()
    }

    pub fn matches(&self, channel: &str) -> bool {
        self.channel == channel
    }

    pub fn off_hook(&self) -> &Confirmed<bool> {
        &self.off_hook
    }

    pub fn incoming_call(&self) -> &Confirmed<bool> {
        &self.incoming_call
    }

    pub fn auto_answer(&self) -> &Confirmed<bool> {
        &self.auto_answer
    }

    pub fn do_not_disturb(&self) -> &Confirmed<bool> {
        &self.do_not_disturb
    }

    pub fn caller_id_number(&self) -> &Confirmed<String> {
        &self.caller_id_number
    }

    pub fn local_number(&self) -> &Confirmed<String> {
        &self.local_number
    }

    pub fn dial_string(&self) -> &Local<String> {
        &self.dial_string
    }

    /// Apply a routed response to this line.
    pub fn apply(&self, param: DialerParam, response: &ResponseLine) {
        let value = response.value.trim();
        match param {
            DialerParam::Hook => self.off_hook.confirm(value == "1"),
            DialerParam::CallStatus => match classify_call_status(&response.sub_tokens()) {
                CallStatus::Incoming { caller } => {
                    tracing::debug!(key = %self.key, parameter = %response.parameter, "incoming call");
                    self.incoming_call.confirm(true);
                    if let Some(number) = caller {
                        self.caller_id_number.confirm(number);
                    }
                }
                CallStatus::OnHook => self.off_hook.confirm(false),
                CallStatus::OffHook => self.off_hook.confirm(true),
                CallStatus::Empty => {
                    tracing::trace!(key = %self.key, parameter = %response.parameter, "empty call status");
                }
            },
            DialerParam::IncomingCall => self.incoming_call.confirm(value == "1"),
            DialerParam::AutoAnswer => self.auto_answer.confirm(value == "1"),
            DialerParam::AutoAnswerRings => match value.parse::<u32>() {
                Ok(rings) => self.auto_answer.confirm(rings > 0),
                Err(_) => {
                    tracing::warn!(key = %self.key, value, "auto answer rings not numeric, ignored");
                }
            },
            DialerParam::CallerId => self
                .caller_id_number
                .confirm(extract_caller_number(value)),
            DialerParam::LocalNumber => self.local_number.confirm(unquote(value).to_string()),
            DialerParam::DoNotDisturb => self.do_not_disturb.confirm(value == "1"),
            DialerParam::RingEnable => self.do_not_disturb.confirm(value == "0"),
        }
    }

    fn send(&self, line: String) {
        self.transmitter.send_line(line);
    }

    pub fn get_hook_state(&self) {
        self.send(self.kind.hook_inquiry(&self.channel));
    }

    /// Hook inquiry plus mode-specific status queries.
    pub fn poll(&self) {
        self.get_hook_state();
        for line in self.kind.extra_polls(&self.channel) {
            self.send(line);
        }
    }

    /// Register for call notifications. Safe to repeat after every reconnect.
    pub fn subscribe_to_notifications(&self) {
        for line in self.kind.subscriptions(&self.channel) {
            self.send(line);
        }
    }

    fn hang_up(&self) {
        self.incoming_call.retract(false);
        self.send(self.kind.hook(&self.channel, false));
        if self.clear_on_hangup {
            self.dial_string.edit(String::clear);
        }
    }

    /// Remember the runtime keypad sequencing runs on.
    pub fn attach_runtime(&self, handle: Handle) {
        *self.runtime.lock() = Some(handle);
    }

    fn keypad_sender(&self) -> Option<mpsc::UnboundedSender<char>> {
        let mut guard = self.keypad.lock();
        if let Some(tx) = guard.as_ref().filter(|tx| !tx.is_closed()) {
            return Some(tx.clone());
        }

        let Some(handle) = Handle::try_current()
            .ok()
            .or_else(|| self.runtime.lock().clone())
        else {
            tracing::warn!(key = %self.key, "no runtime for keypad sequencing, digit dropped");
            return None;
        };
        let (tx, rx) = mpsc::unbounded_channel();
        handle.spawn(run_keypad(
            rx,
            self.kind,
            self.channel.clone(),
            self.transmitter.clone(),
            self.timing,
        ));
        *guard = Some(tx.clone());
        Some(tx)
    }
}

/// Send queued DTMF digits one press/release/poll sequence at a time.
async fn run_keypad(
    mut digits: mpsc::UnboundedReceiver<char>,
    kind: LineKind,
    channel: String,
    transmitter: CommandTransmitter,
    timing: KeypadTiming,
) {
    while let Some(digit) = digits.recv().await {
        transmitter.send_line(kind.digit_pressed(&channel, digit));
        tokio::time::sleep(timing.press).await;
        transmitter.send_line(kind.digit_released(&channel, digit));
        tokio::time::sleep(timing.poll).await;
        transmitter.send_line(kind.digits_dialed_inquiry(&channel));
    }
}

impl Dialer for DialerLine {
    fn dial(&self, number: Option<&str>) {
        if self.off_hook.get() {
            self.end_all_calls();
            return;
        }

        match number.map(str::trim).filter(|n| !n.is_empty()) {
            Some(number) => self.send(self.kind.dial(&self.channel, number)),
            None => {
                let buffered = self.dial_string.get();
                if buffered.is_empty() {
                    self.send(self.kind.hook(&self.channel, true));
                } else {
                    self.send(self.kind.dial(&self.channel, &buffered));
                }
            }
        }
    }

    fn end_all_calls(&self) {
        self.hang_up();
    }

    fn accept_call(&self) {
        self.incoming_call.retract(false);
        self.send(self.kind.hook(&self.channel, true));
    }

    fn reject_call(&self) {
        self.incoming_call.retract(false);
        self.send(self.kind.reject(&self.channel));
        if self.clear_on_hangup {
            self.dial_string.edit(String::clear);
        }
    }

    fn send_keypad(&self, key: KeypadKey) {
        match key {
            KeypadKey::Clear => self.dial_string.edit(String::clear),
            KeypadKey::Backspace => self.dial_string.edit(|s| {
                s.pop();
            }),
            _ => {
                let Some(digit) = key.as_char() else {
                    tracing::debug!(key = %self.key, ?key, "not a dialable key");
                    return;
                };
                if self.off_hook.get() {
                    if let Some(tx) = self.keypad_sender() {
                        if tx.send(digit).is_err() {
                            tracing::debug!(key = %self.key, %digit, "keypad worker gone, digit dropped");
                        }
                    }
                } else {
                    self.dial_string.edit(|s| s.push(digit));
                }
            }
        }
    }

    fn do_not_disturb_on(&self) {
        self.send(self.kind.do_not_disturb(&self.channel, true));
    }

    fn do_not_disturb_off(&self) {
        self.send(self.kind.do_not_disturb(&self.channel, false));
    }

    fn do_not_disturb_toggle(&self) {
        let on = !self.do_not_disturb.get();
        self.send(self.kind.do_not_disturb(&self.channel, on));
    }

    fn auto_answer_on(&self) {
        self.send(self.kind.auto_answer(&self.channel, true));
    }

    fn auto_answer_off(&self) {
        self.send(self.kind.auto_answer(&self.channel, false));
    }

    fn auto_answer_toggle(&self) {
        let on = !self.auto_answer.get();
        self.send(self.kind.auto_answer(&self.channel, on));
    }

    fn is_off_hook(&self) -> bool {
        self.off_hook.get()
    }

    fn is_incoming_call(&self) -> bool {
        self.incoming_call.get()
    }
}
