//! Panel date/time wire forms.
//!
//! Calendar values travel as packed byte groups: a full timestamp is six
//! bytes `{year-2000, month, day, hour, minute, second}`, a date or a
//! time-of-day is three. Nullable fields use an all-`0xFF` group.

use super::{FieldCodec, Reader, Stamp, WireError, Writer};

/// Full panel timestamp, second resolution, years 2000-2255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PanelDateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// Calendar date without a time-of-day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PanelDate {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

/// Time-of-day without a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PanelTime {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

fn year_byte(year: u16, field: &'static str) -> Result<u8, WireError> {
    year.checked_sub(2000)
        .and_then(|y| u8::try_from(y).ok())
        .ok_or(WireError::OutOfRange { field })
}

impl FieldCodec<PanelDateTime> for Stamp {
    fn put(value: &PanelDateTime, field: &'static str, w: &mut Writer) -> Result<(), WireError> {
        w.put_u8(year_byte(value.year, field)?);
        w.put_u8(value.month);
        w.put_u8(value.day);
        w.put_u8(value.hour);
        w.put_u8(value.minute);
        w.put_u8(value.second);
        Ok(())
    }

    fn take(field: &'static str, r: &mut Reader<'_>) -> Result<PanelDateTime, WireError> {
        let b = r.take_slice(6, field)?;
        Ok(PanelDateTime {
            year: 2000 + u16::from(b[0]),
            month: b[1],
            day: b[2],
            hour: b[3],
            minute: b[4],
            second: b[5],
        })
    }
}

impl FieldCodec<Option<PanelDateTime>> for Stamp {
    fn put(
        value: &Option<PanelDateTime>,
        field: &'static str,
        w: &mut Writer,
    ) -> Result<(), WireError> {
        match value {
            Some(v) => <Stamp as FieldCodec<PanelDateTime>>::put(v, field, w),
            None => {
                w.put_slice(&[0xFF; 6]);
                Ok(())
            }
        }
    }

    fn take(field: &'static str, r: &mut Reader<'_>) -> Result<Option<PanelDateTime>, WireError> {
        let b = r.take_slice(6, field)?;
        if b.iter().all(|&x| x == 0xFF) {
            return Ok(None);
        }
        Ok(Some(PanelDateTime {
            year: 2000 + u16::from(b[0]),
            month: b[1],
            day: b[2],
            hour: b[3],
            minute: b[4],
            second: b[5],
        }))
    }
}

impl FieldCodec<PanelDate> for Stamp {
    fn put(value: &PanelDate, field: &'static str, w: &mut Writer) -> Result<(), WireError> {
        w.put_u8(year_byte(value.year, field)?);
        w.put_u8(value.month);
        w.put_u8(value.day);
        Ok(())
    }

    fn take(field: &'static str, r: &mut Reader<'_>) -> Result<PanelDate, WireError> {
        let b = r.take_slice(3, field)?;
        Ok(PanelDate {
            year: 2000 + u16::from(b[0]),
            month: b[1],
            day: b[2],
        })
    }
}

impl FieldCodec<Option<PanelDate>> for Stamp {
    fn put(
        value: &Option<PanelDate>,
        field: &'static str,
        w: &mut Writer,
    ) -> Result<(), WireError> {
        match value {
            Some(v) => <Stamp as FieldCodec<PanelDate>>::put(v, field, w),
            None => {
                w.put_slice(&[0xFF; 3]);
                Ok(())
            }
        }
    }

    fn take(field: &'static str, r: &mut Reader<'_>) -> Result<Option<PanelDate>, WireError> {
        let b = r.take_slice(3, field)?;
        if b.iter().all(|&x| x == 0xFF) {
            return Ok(None);
        }
        Ok(Some(PanelDate {
            year: 2000 + u16::from(b[0]),
            month: b[1],
            day: b[2],
        }))
    }
}

impl FieldCodec<PanelTime> for Stamp {
    fn put(value: &PanelTime, _field: &'static str, w: &mut Writer) -> Result<(), WireError> {
        w.put_u8(value.hour);
        w.put_u8(value.minute);
        w.put_u8(value.second);
        Ok(())
    }

    fn take(field: &'static str, r: &mut Reader<'_>) -> Result<PanelTime, WireError> {
        let b = r.take_slice(3, field)?;
        Ok(PanelTime {
            hour: b[0],
            minute: b[1],
            second: b[2],
        })
    }
}

impl FieldCodec<Option<PanelTime>> for Stamp {
    fn put(
        value: &Option<PanelTime>,
        field: &'static str,
        w: &mut Writer,
    ) -> Result<(), WireError> {
        match value {
            Some(v) => <Stamp as FieldCodec<PanelTime>>::put(v, field, w),
            None => {
                w.put_slice(&[0xFF; 3]);
                Ok(())
            }
        }
    }

    fn take(field: &'static str, r: &mut Reader<'_>) -> Result<Option<PanelTime>, WireError> {
        let b = r.take_slice(3, field)?;
        if b.iter().all(|&x| x == 0xFF) {
            return Ok(None);
        }
        Ok(Some(PanelTime {
            hour: b[0],
            minute: b[1],
            second: b[2],
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datetime_wire_form() {
        let dt = PanelDateTime {
            year: 2026,
            month: 8,
            day: 2,
            hour: 13,
            minute: 45,
            second: 9,
        };
        let mut w = Writer::new();
        <Stamp as FieldCodec<PanelDateTime>>::put(&dt, "t", &mut w).unwrap();
        assert_eq!(w.into_bytes(), vec![26, 8, 2, 13, 45, 9]);
    }

    #[test]
    fn test_nullable_datetime() {
        let mut w = Writer::new();
        <Stamp as FieldCodec<Option<PanelDateTime>>>::put(&None, "t", &mut w).unwrap();
        let bytes = w.into_bytes();
        assert_eq!(bytes, vec![0xFF; 6]);
        let mut r = Reader::new(&bytes);
        assert_eq!(
            <Stamp as FieldCodec<Option<PanelDateTime>>>::take("t", &mut r).unwrap(),
            None
        );
    }

    #[test]
    fn test_year_out_of_range() {
        let dt = PanelDate {
            year: 1999,
            month: 12,
            day: 31,
        };
        let mut w = Writer::new();
        let err = <Stamp as FieldCodec<PanelDate>>::put(&dt, "t", &mut w).unwrap_err();
        assert_eq!(err, WireError::OutOfRange { field: "t" });
    }

    #[test]
    fn test_time_round_trip() {
        let t = PanelTime {
            hour: 23,
            minute: 59,
            second: 58,
        };
        let mut w = Writer::new();
        <Stamp as FieldCodec<PanelTime>>::put(&t, "t", &mut w).unwrap();
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(<Stamp as FieldCodec<PanelTime>>::take("t", &mut r).unwrap(), t);
    }
}
