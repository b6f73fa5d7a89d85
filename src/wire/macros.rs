//! Declarative macros expanding field-annotated message declarations
//! into [`WireRecord`](super::WireRecord) implementations.

/// Declares an enum with a fixed-width wire representation.
///
/// Unknown discriminants surface as `WireError::UnknownDiscriminant`
/// naming the field being decoded.
#[macro_export]
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident : $repr:ty {
            $( $(#[$vmeta:meta])* $variant:ident = $value:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr($repr)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $value, )+
        }

        impl $crate::wire::WireEnum for $name {
            type Repr = $repr;

            fn to_raw(self) -> $repr {
                self as $repr
            }

            fn from_raw(raw: $repr) -> Option<Self> {
                match raw {
                    $( $value => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }
    };
}

/// Declares a wire message or sub-record.
///
/// Fields serialize in declaration order; each is annotated with its
/// codec in square brackets. Three shapes exist:
///
/// - `command(WORD)`: a command-class message. Gains the leading
///   `command_sequence` byte and a
///   [`CommandMessage`](super::CommandMessage) impl.
/// - `notification(WORD)`: a plain message acknowledged at the
///   protocol level only.
/// - `record`: a bare sub-record (object-array element), no command
///   word.
#[macro_export]
macro_rules! wire_message {
    (
        $(#[$meta:meta])*
        pub struct $name:ident : command($command:expr) {
            $( $(#[$fmeta:meta])* pub $field:ident : $fty:ty [ $codec:ty ] ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            /// Command-transaction correlation byte; always serialized
            /// first.
            pub command_sequence: u8,
            $( $(#[$fmeta])* pub $field: $fty, )*
        }

        impl $name {
            /// Wire command word.
            pub const COMMAND: u16 = $command;
        }

        impl $crate::wire::CommandMessage for $name {
            fn command_sequence(&self) -> u8 {
                self.command_sequence
            }

            fn set_command_sequence(&mut self, seq: u8) {
                self.command_sequence = seq;
            }
        }

        impl $crate::wire::WireRecord for $name {
            fn put_fields(
                &self,
                w: &mut $crate::wire::Writer,
            ) -> ::std::result::Result<(), $crate::wire::WireError> {
                <$crate::wire::Be as $crate::wire::FieldCodec<u8>>::put(
                    &self.command_sequence,
                    "command_sequence",
                    w,
                )?;
                $(
                    <$codec as $crate::wire::FieldCodec<$fty>>::put(
                        &self.$field,
                        stringify!($field),
                        w,
                    )?;
                )*
                Ok(())
            }

            fn take_fields(
                r: &mut $crate::wire::Reader<'_>,
            ) -> ::std::result::Result<Self, $crate::wire::WireError> {
                Ok(Self {
                    command_sequence: <$crate::wire::Be as $crate::wire::FieldCodec<u8>>::take(
                        "command_sequence",
                        r,
                    )?,
                    $(
                        $field: <$codec as $crate::wire::FieldCodec<$fty>>::take(
                            stringify!($field),
                            r,
                        )?,
                    )*
                })
            }
        }
    };

    (
        $(#[$meta:meta])*
        pub struct $name:ident : notification($command:expr) {
            $( $(#[$fmeta:meta])* pub $field:ident : $fty:ty [ $codec:ty ] ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: $fty, )*
        }

        impl $name {
            /// Wire command word.
            pub const COMMAND: u16 = $command;
        }

        impl $crate::wire::WireRecord for $name {
            fn put_fields(
                &self,
                w: &mut $crate::wire::Writer,
            ) -> ::std::result::Result<(), $crate::wire::WireError> {
                $(
                    <$codec as $crate::wire::FieldCodec<$fty>>::put(
                        &self.$field,
                        stringify!($field),
                        w,
                    )?;
                )*
                let _ = w;
                Ok(())
            }

            fn take_fields(
                r: &mut $crate::wire::Reader<'_>,
            ) -> ::std::result::Result<Self, $crate::wire::WireError> {
                let _ = &r;
                Ok(Self {
                    $(
                        $field: <$codec as $crate::wire::FieldCodec<$fty>>::take(
                            stringify!($field),
                            r,
                        )?,
                    )*
                })
            }
        }
    };

    (
        $(#[$meta:meta])*
        pub struct $name:ident : record {
            $( $(#[$fmeta:meta])* pub $field:ident : $fty:ty [ $codec:ty ] ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: $fty, )*
        }

        impl $crate::wire::WireRecord for $name {
            fn put_fields(
                &self,
                w: &mut $crate::wire::Writer,
            ) -> ::std::result::Result<(), $crate::wire::WireError> {
                $(
                    <$codec as $crate::wire::FieldCodec<$fty>>::put(
                        &self.$field,
                        stringify!($field),
                        w,
                    )?;
                )*
                let _ = w;
                Ok(())
            }

            fn take_fields(
                r: &mut $crate::wire::Reader<'_>,
            ) -> ::std::result::Result<Self, $crate::wire::WireError> {
                let _ = &r;
                Ok(Self {
                    $(
                        $field: <$codec as $crate::wire::FieldCodec<$fty>>::take(
                            stringify!($field),
                            r,
                        )?,
                    )*
                })
            }
        }
    };
}
