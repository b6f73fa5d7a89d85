//! ITv2 message catalog and command-word factory.
//!
//! Every message type declares its wire layout through the serializer
//! macros; the [`Message`] enum carries whichever concrete type arrived
//! and the factory maps the leading 2-byte command word to it. Unknown
//! words round-trip through [`DefaultMessage`] untouched.

use crate::wire::{
    Bcd, BcdPrefixed, BcdTail, Be, Compact, En, Packed, PackedFlags, PanelDateTime, RawPrefixed,
    Reader, Rec, Stamp, Utf16, Utf16Table, WireError, WireRecord, Writer,
};
use crate::{wire_enum, wire_message};

wire_enum! {
    /// Encryption scheme requested by the panel in `OpenSession`.
    pub enum EncryptionType : u8 {
        Type1 = 0x01,
        Type2 = 0x02,
    }
}

wire_enum! {
    /// What kind of device opened the session.
    pub enum DeviceType : u8 {
        Panel = 0x01,
        Communicator = 0x02,
        Keypad = 0x03,
    }
}

wire_enum! {
    /// Panel verdict on a completed command round trip.
    ///
    /// Anything but `Success` is a panel-level rejection: the transport
    /// round trip succeeded and the caller classifies the payload.
    pub enum ResponseCode : u8 {
        Success = 0x00,
        Busy = 0x01,
        Rejected = 0x02,
        InvalidArgument = 0x03,
        NotSupported = 0x04,
    }
}

wire_enum! {
    /// Command-level NACK reasons.
    pub enum CommandErrorCode : u8 {
        UnknownCommand = 0x01,
        BadPayload = 0x02,
        NotPermitted = 0x03,
    }
}

wire_enum! {
    /// Reported state of a single zone.
    pub enum ZoneState : u8 {
        Closed = 0x00,
        Open = 0x01,
        Tamper = 0x02,
        Fault = 0x03,
        Bypassed = 0x04,
    }
}

/// Partition status bit-field, 2-byte storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PartitionFlags(u16);

impl PartitionFlags {
    pub const READY: u16 = 1 << 0;
    pub const ARMED_AWAY: u16 = 1 << 1;
    pub const ARMED_STAY: u16 = 1 << 2;
    pub const ALARM: u16 = 1 << 3;
    pub const ALARM_MEMORY: u16 = 1 << 4;
    pub const TROUBLE: u16 = 1 << 5;
    pub const EXIT_DELAY: u16 = 1 << 6;
    pub const ENTRY_DELAY: u16 = 1 << 7;

    pub fn new(bits: u16) -> Self {
        Self(bits)
    }

    pub fn has(self, flag: u16) -> bool {
        self.0 & flag != 0
    }

    pub fn set(&mut self, flag: u16) {
        self.0 |= flag;
    }

    pub fn bits(self) -> u16 {
        self.0
    }
}

impl PackedFlags for PartitionFlags {
    const WIDTH: usize = 2;

    fn to_bits(self) -> u32 {
        u32::from(self.0)
    }

    fn from_bits(bits: u32) -> Self {
        Self(bits as u16)
    }
}

/// System trouble bit-field, 4-byte storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TroubleFlags(u32);

impl TroubleFlags {
    pub const AC_FAILURE: u32 = 1 << 0;
    pub const BATTERY_LOW: u32 = 1 << 1;
    pub const PHONE_LINE: u32 = 1 << 2;
    pub const COMMS_FAILURE: u32 = 1 << 3;
    pub const BELL_CIRCUIT: u32 = 1 << 4;
    pub const CLOCK_LOSS: u32 = 1 << 5;
    pub const TAMPER: u32 = 1 << 6;
    pub const ZONE_FAULT: u32 = 1 << 7;

    pub fn new(bits: u32) -> Self {
        Self(bits)
    }

    pub fn has(self, flag: u32) -> bool {
        self.0 & flag != 0
    }

    pub fn set(&mut self, flag: u32) {
        self.0 |= flag;
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl PackedFlags for TroubleFlags {
    const WIDTH: usize = 4;

    fn to_bits(self) -> u32 {
        self.0
    }

    fn from_bits(bits: u32) -> Self {
        Self(bits)
    }
}

wire_message! {
    /// One zone reference inside a bypass request.
    pub struct ZoneRef : record {
        pub partition: u8 [Be],
        pub zone: u16 [Be],
    }
}

wire_message! {
    /// First message of the handshake, always initiated by the panel.
    ///
    /// The server mirrors it back in step two; `encryption_type` selects
    /// the session cipher.
    pub struct OpenSession : command(0x0010) {
        pub device_type: DeviceType [En],
        pub protocol_version: u16 [Be],
        pub software_revision: String [Bcd<2>],
        pub encryption_type: EncryptionType [En],
        pub device_id: Vec<u8> [RawPrefixed<1>],
    }
}

wire_message! {
    /// Positive completion of a command transaction.
    pub struct CommandResponse : command(0x0020) {
        pub code: ResponseCode [En],
    }
}

impl CommandResponse {
    /// Whether the panel accepted the command.
    pub fn is_success(&self) -> bool {
        self.code == ResponseCode::Success
    }
}

wire_message! {
    /// Carries one side's encryption initializer during the handshake.
    pub struct RequestAccess : command(0x0021) {
        pub initializer: Vec<u8> [RawPrefixed<1>],
    }
}

wire_message! {
    /// Command-level NACK; completes the transaction like a response.
    pub struct CommandError : command(0x0022) {
        pub code: CommandErrorCode [En],
    }
}

wire_message! {
    /// Requests a full status dump from the panel.
    pub struct StatusRequest : command(0x0052) {}
}

wire_message! {
    /// Sets the panel clock.
    pub struct SetTimeDate : command(0x0054) {
        pub when: PanelDateTime [Stamp],
    }
}

wire_message! {
    /// Bypasses the listed zones.
    pub struct ZoneBypass : command(0x0055) {
        pub zones: Vec<ZoneRef> [Rec<1>],
    }
}

wire_message! {
    /// Writes a user access code.
    pub struct UserCodeWrite : command(0x0056) {
        pub user: u16 [Be],
        pub code: String [BcdPrefixed],
    }
}

wire_message! {
    /// Keep-alive; the panel drops the link after 120 s of silence.
    pub struct ConnectionPoll : notification(0x0001) {}
}

wire_message! {
    /// Zone state change.
    pub struct ZoneStatus : notification(0x0841) {
        pub partition: u8 [Be],
        pub zone: u16 [Be],
        pub state: ZoneState [En],
    }
}

wire_message! {
    /// Partition status snapshot.
    pub struct PartitionStatus : notification(0x0851) {
        pub partition: u8 [Be],
        pub flags: PartitionFlags [Packed],
    }
}

wire_message! {
    /// Logged panel event with optional timestamp and display text.
    pub struct EventReport : notification(0x0861) {
        pub code: u16 [Be],
        pub occurred: Option<PanelDateTime> [Stamp],
        pub user: u32 [Compact],
        pub text: String [Utf16<2>],
    }
}

wire_message! {
    /// System trouble summary.
    pub struct TroubleSummary : notification(0x0871) {
        pub partition: u8 [Be],
        pub flags: TroubleFlags [Packed],
    }
}

wire_message! {
    /// Block of zone labels starting at `first_zone`.
    pub struct ZoneLabels : notification(0x0881) {
        pub first_zone: u16 [Be],
        pub labels: Vec<String> [Utf16Table],
    }
}

wire_message! {
    /// Central-station account number for a partition.
    pub struct AccountReport : notification(0x0882) {
        pub partition: u8 [Be],
        pub account: String [BcdTail],
    }
}

/// Envelope bundling several messages into one protocol transaction.
///
/// Body is `{u16 length}{serialized message}` repeated to the end of the
/// buffer; each embedded message carries its own command word (and
/// command sequence, where applicable).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipleMessage {
    pub messages: Vec<Message>,
}

impl MultipleMessage {
    /// Wire command word.
    pub const COMMAND: u16 = 0x0012;
}

impl WireRecord for MultipleMessage {
    fn put_fields(&self, w: &mut Writer) -> Result<(), WireError> {
        for message in &self.messages {
            let bytes = message.encode()?;
            if bytes.len() > u16::MAX as usize {
                return Err(WireError::LengthOverflow {
                    field: "messages",
                    len: bytes.len(),
                    max: u16::MAX as usize,
                });
            }
            w.put_u16(bytes.len() as u16);
            w.put_slice(&bytes);
        }
        Ok(())
    }

    fn take_fields(r: &mut Reader<'_>) -> Result<Self, WireError> {
        let mut messages = Vec::new();
        while !r.is_empty() {
            let len = r.take_u16("messages")? as usize;
            let body = r.take_slice(len, "messages")?;
            messages.push(Message::decode(body)?);
        }
        Ok(Self { messages })
    }
}

/// Fallback for command words not in the registry.
///
/// `data` is everything after the command word, preserved byte-exact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultMessage {
    pub command: u16,
    pub data: Vec<u8>,
}

/// Any ITv2 message, tagged by concrete type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    OpenSession(OpenSession),
    CommandResponse(CommandResponse),
    RequestAccess(RequestAccess),
    CommandError(CommandError),
    StatusRequest(StatusRequest),
    SetTimeDate(SetTimeDate),
    ZoneBypass(ZoneBypass),
    UserCodeWrite(UserCodeWrite),
    ConnectionPoll(ConnectionPoll),
    Multiple(MultipleMessage),
    ZoneStatus(ZoneStatus),
    PartitionStatus(PartitionStatus),
    EventReport(EventReport),
    TroubleSummary(TroubleSummary),
    ZoneLabels(ZoneLabels),
    AccountReport(AccountReport),
    Default(DefaultMessage),
}

impl Message {
    /// The 2-byte command word this message serializes under.
    pub fn command(&self) -> u16 {
        match self {
            Self::OpenSession(_) => OpenSession::COMMAND,
            Self::CommandResponse(_) => CommandResponse::COMMAND,
            Self::RequestAccess(_) => RequestAccess::COMMAND,
            Self::CommandError(_) => CommandError::COMMAND,
            Self::StatusRequest(_) => StatusRequest::COMMAND,
            Self::SetTimeDate(_) => SetTimeDate::COMMAND,
            Self::ZoneBypass(_) => ZoneBypass::COMMAND,
            Self::UserCodeWrite(_) => UserCodeWrite::COMMAND,
            Self::ConnectionPoll(_) => ConnectionPoll::COMMAND,
            Self::Multiple(_) => MultipleMessage::COMMAND,
            Self::ZoneStatus(_) => ZoneStatus::COMMAND,
            Self::PartitionStatus(_) => PartitionStatus::COMMAND,
            Self::EventReport(_) => EventReport::COMMAND,
            Self::TroubleSummary(_) => TroubleSummary::COMMAND,
            Self::ZoneLabels(_) => ZoneLabels::COMMAND,
            Self::AccountReport(_) => AccountReport::COMMAND,
            Self::Default(d) => d.command,
        }
    }

    /// Short name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenSession(_) => "OpenSession",
            Self::CommandResponse(_) => "CommandResponse",
            Self::RequestAccess(_) => "RequestAccess",
            Self::CommandError(_) => "CommandError",
            Self::StatusRequest(_) => "StatusRequest",
            Self::SetTimeDate(_) => "SetTimeDate",
            Self::ZoneBypass(_) => "ZoneBypass",
            Self::UserCodeWrite(_) => "UserCodeWrite",
            Self::ConnectionPoll(_) => "ConnectionPoll",
            Self::Multiple(_) => "MultipleMessage",
            Self::ZoneStatus(_) => "ZoneStatus",
            Self::PartitionStatus(_) => "PartitionStatus",
            Self::EventReport(_) => "EventReport",
            Self::TroubleSummary(_) => "TroubleSummary",
            Self::ZoneLabels(_) => "ZoneLabels",
            Self::AccountReport(_) => "AccountReport",
            Self::Default(_) => "DefaultMessage",
        }
    }

    /// Whether this is a command-class message carrying a command
    /// sequence byte.
    pub fn is_command(&self) -> bool {
        self.command_sequence().is_some()
    }

    /// The command-transaction correlation byte, for command-class
    /// messages.
    pub fn command_sequence(&self) -> Option<u8> {
        match self {
            Self::OpenSession(m) => Some(m.command_sequence),
            Self::CommandResponse(m) => Some(m.command_sequence),
            Self::RequestAccess(m) => Some(m.command_sequence),
            Self::CommandError(m) => Some(m.command_sequence),
            Self::StatusRequest(m) => Some(m.command_sequence),
            Self::SetTimeDate(m) => Some(m.command_sequence),
            Self::ZoneBypass(m) => Some(m.command_sequence),
            Self::UserCodeWrite(m) => Some(m.command_sequence),
            _ => None,
        }
    }

    /// Stamp the command sequence into a command-class message.
    ///
    /// Non-command messages are left untouched.
    pub fn set_command_sequence(&mut self, seq: u8) {
        match self {
            Self::OpenSession(m) => m.command_sequence = seq,
            Self::CommandResponse(m) => m.command_sequence = seq,
            Self::RequestAccess(m) => m.command_sequence = seq,
            Self::CommandError(m) => m.command_sequence = seq,
            Self::StatusRequest(m) => m.command_sequence = seq,
            Self::SetTimeDate(m) => m.command_sequence = seq,
            Self::ZoneBypass(m) => m.command_sequence = seq,
            Self::UserCodeWrite(m) => m.command_sequence = seq,
            _ => {}
        }
    }

    /// Serialize: command word, then the body in declaration order.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut w = Writer::new();
        w.put_u16(self.command());
        match self {
            Self::OpenSession(m) => m.put_fields(&mut w)?,
            Self::CommandResponse(m) => m.put_fields(&mut w)?,
            Self::RequestAccess(m) => m.put_fields(&mut w)?,
            Self::CommandError(m) => m.put_fields(&mut w)?,
            Self::StatusRequest(m) => m.put_fields(&mut w)?,
            Self::SetTimeDate(m) => m.put_fields(&mut w)?,
            Self::ZoneBypass(m) => m.put_fields(&mut w)?,
            Self::UserCodeWrite(m) => m.put_fields(&mut w)?,
            Self::ConnectionPoll(m) => m.put_fields(&mut w)?,
            Self::Multiple(m) => m.put_fields(&mut w)?,
            Self::ZoneStatus(m) => m.put_fields(&mut w)?,
            Self::PartitionStatus(m) => m.put_fields(&mut w)?,
            Self::EventReport(m) => m.put_fields(&mut w)?,
            Self::TroubleSummary(m) => m.put_fields(&mut w)?,
            Self::ZoneLabels(m) => m.put_fields(&mut w)?,
            Self::AccountReport(m) => m.put_fields(&mut w)?,
            Self::Default(d) => w.put_slice(&d.data),
        }
        Ok(w.into_bytes())
    }

    /// Deserialize from the bytes following the sequence pair.
    ///
    /// Unknown command words produce a [`DefaultMessage`] carrying the
    /// raw body.
    pub fn decode(data: &[u8]) -> Result<Message, WireError> {
        let mut r = Reader::new(data);
        let command = r.take_u16("command")?;
        Ok(match command {
            OpenSession::COMMAND => Self::OpenSession(OpenSession::take_fields(&mut r)?),
            CommandResponse::COMMAND => {
                Self::CommandResponse(CommandResponse::take_fields(&mut r)?)
            }
            RequestAccess::COMMAND => Self::RequestAccess(RequestAccess::take_fields(&mut r)?),
            CommandError::COMMAND => Self::CommandError(CommandError::take_fields(&mut r)?),
            StatusRequest::COMMAND => Self::StatusRequest(StatusRequest::take_fields(&mut r)?),
            SetTimeDate::COMMAND => Self::SetTimeDate(SetTimeDate::take_fields(&mut r)?),
            ZoneBypass::COMMAND => Self::ZoneBypass(ZoneBypass::take_fields(&mut r)?),
            UserCodeWrite::COMMAND => Self::UserCodeWrite(UserCodeWrite::take_fields(&mut r)?),
            ConnectionPoll::COMMAND => Self::ConnectionPoll(ConnectionPoll::take_fields(&mut r)?),
            MultipleMessage::COMMAND => Self::Multiple(MultipleMessage::take_fields(&mut r)?),
            ZoneStatus::COMMAND => Self::ZoneStatus(ZoneStatus::take_fields(&mut r)?),
            PartitionStatus::COMMAND => {
                Self::PartitionStatus(PartitionStatus::take_fields(&mut r)?)
            }
            EventReport::COMMAND => Self::EventReport(EventReport::take_fields(&mut r)?),
            TroubleSummary::COMMAND => Self::TroubleSummary(TroubleSummary::take_fields(&mut r)?),
            ZoneLabels::COMMAND => Self::ZoneLabels(ZoneLabels::take_fields(&mut r)?),
            AccountReport::COMMAND => Self::AccountReport(AccountReport::take_fields(&mut r)?),
            _ => Self::Default(DefaultMessage {
                command,
                data: r.take_rest().to_vec(),
            }),
        })
    }
}
