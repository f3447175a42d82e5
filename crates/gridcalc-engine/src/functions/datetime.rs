//! Date and time functions
//!
//! Dates are serial numbers in the 1900 date system: day 1 is
//! 1899-12-31 and fractional parts carry the time of day. NOW and TODAY
//! read the engine clock, which tests replace with a fixed one.

use super::{try_num, FunctionRegistry};
use crate::FnCtx;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use gridcalc_core::{ErrorKind, FormulaArgument};

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry.add("DATE", 3, Some(3), fn_date);
    registry.add("DATEVALUE", 1, Some(1), fn_datevalue);
    registry.add("DAY", 1, Some(1), fn_day);
    registry.add("DAYS", 2, Some(2), fn_days);
    registry.add("EDATE", 2, Some(2), fn_edate);
    registry.add("EOMONTH", 2, Some(2), fn_eomonth);
    registry.add("HOUR", 1, Some(1), fn_hour);
    registry.add("MINUTE", 1, Some(1), fn_minute);
    registry.add("MONTH", 1, Some(1), fn_month);
    registry.add_volatile("NOW", 0, Some(0), fn_now);
    registry.add("SECOND", 1, Some(1), fn_second);
    registry.add("TIME", 3, Some(3), fn_time);
    registry.add_volatile("TODAY", 0, Some(0), fn_today);
    registry.add("WEEKDAY", 1, Some(2), fn_weekday);
    registry.add("YEAR", 1, Some(1), fn_year);
}

fn epoch() -> NaiveDate {
    // Serial 0; unwrap is fine for a constant date
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default()
}

pub(crate) fn serial_from_date(date: NaiveDate) -> f64 {
    (date - epoch()).num_days() as f64
}

pub(crate) fn serial_from_datetime(dt: NaiveDateTime) -> f64 {
    serial_from_date(dt.date()) + dt.num_seconds_from_midnight() as f64 / 86_400.0
}

pub(crate) fn date_from_serial(serial: f64) -> Option<NaiveDate> {
    if serial < 0.0 {
        return None;
    }
    epoch().checked_add_signed(Duration::days(serial.trunc() as i64))
}

/// Clamp a day-of-month into the month actually containing it
fn clamped_ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).or_else(|| {
        let last = days_in_month(year, month)?;
        NaiveDate::from_ymd_opt(year, month, day.min(last))
    })
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((next - first).num_days() as u32)
}

pub(crate) fn shift_months(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let total = date.year() as i64 * 12 + date.month0() as i64 + months;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;
    clamped_ymd(i32::try_from(year).ok()?, month, date.day())
}

macro_rules! try_date {
    ($arg:expr) => {
        match date_from_serial(try_num!($arg)) {
            Some(date) => date,
            None => return FormulaArgument::error(ErrorKind::Num),
        }
    };
}

pub fn fn_date(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let year = try_num!(args[0]).trunc() as i64;
    let month = try_num!(args[1]).trunc() as i64;
    let day = try_num!(args[2]).trunc() as i64;
    // Two-digit years land in the 1900s
    let year = if (0..=1899).contains(&year) { year + 1900 } else { year };
    if !(1900..=9999).contains(&year) {
        return FormulaArgument::error(ErrorKind::Num);
    }
    // Out-of-range months and days roll over into adjacent periods
    let total = year * 12 + (month - 1);
    let Ok(norm_year) = i32::try_from(total.div_euclid(12)) else {
        return FormulaArgument::error(ErrorKind::Num);
    };
    let norm_month = total.rem_euclid(12) as u32 + 1;
    let Some(first) = NaiveDate::from_ymd_opt(norm_year, norm_month, 1) else {
        return FormulaArgument::error(ErrorKind::Num);
    };
    let Some(date) = first.checked_add_signed(Duration::days(day - 1)) else {
        return FormulaArgument::error(ErrorKind::Num);
    };
    let serial = serial_from_date(date);
    if serial < 0.0 {
        return FormulaArgument::error(ErrorKind::Num);
    }
    FormulaArgument::number(serial)
}

pub fn fn_datevalue(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let text = args[0].to_text();
    let text = text.trim();
    let formats = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m-%d-%Y", "%d-%b-%Y", "%d %B %Y"];
    for format in formats {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return FormulaArgument::number(serial_from_date(date));
        }
    }
    FormulaArgument::error_msg(ErrorKind::Value, format!("cannot parse date {text:?}"))
}

pub fn fn_year(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::number(try_date!(args[0]).year() as f64)
}

pub fn fn_month(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::number(try_date!(args[0]).month() as f64)
}

pub fn fn_day(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::number(try_date!(args[0]).day() as f64)
}

pub fn fn_days(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let end = try_num!(args[0]).trunc();
    let start = try_num!(args[1]).trunc();
    FormulaArgument::number(end - start)
}

pub fn fn_edate(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let start = try_date!(args[0]);
    let months = try_num!(args[1]).trunc() as i64;
    match shift_months(start, months) {
        Some(date) if serial_from_date(date) >= 0.0 => {
            FormulaArgument::number(serial_from_date(date))
        }
        _ => FormulaArgument::error(ErrorKind::Num),
    }
}

pub fn fn_eomonth(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let start = try_date!(args[0]);
    let months = try_num!(args[1]).trunc() as i64;
    let shifted = match shift_months(start, months) {
        Some(date) => date,
        None => return FormulaArgument::error(ErrorKind::Num),
    };
    let last = match days_in_month(shifted.year(), shifted.month())
        .and_then(|d| NaiveDate::from_ymd_opt(shifted.year(), shifted.month(), d))
    {
        Some(date) if serial_from_date(date) >= 0.0 => date,
        _ => return FormulaArgument::error(ErrorKind::Num),
    };
    FormulaArgument::number(serial_from_date(last))
}

pub fn fn_weekday(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let date = try_date!(args[0]);
    let kind = if args.len() > 1 { try_num!(args[1]).trunc() as i64 } else { 1 };
    // Monday = 0 .. Sunday = 6
    let from_monday = date.weekday().num_days_from_monday() as f64;
    let result = match kind {
        1 => (from_monday + 1.0) % 7.0 + 1.0,
        2 => from_monday + 1.0,
        3 => from_monday,
        _ => return FormulaArgument::error(ErrorKind::Num),
    };
    FormulaArgument::number(result)
}

fn time_fraction(serial: f64) -> f64 {
    serial.fract().abs()
}

pub fn fn_hour(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let fraction = time_fraction(try_num!(args[0]));
    FormulaArgument::number((fraction * 24.0).floor() % 24.0)
}

pub fn fn_minute(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let fraction = time_fraction(try_num!(args[0]));
    FormulaArgument::number((fraction * 1440.0).floor() % 60.0)
}

pub fn fn_second(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let fraction = time_fraction(try_num!(args[0]));
    FormulaArgument::number((fraction * 86_400.0).round() % 60.0)
}

pub fn fn_time(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let hour = try_num!(args[0]).trunc();
    let minute = try_num!(args[1]).trunc();
    let second = try_num!(args[2]).trunc();
    if hour < 0.0 || minute < 0.0 || second < 0.0 {
        return FormulaArgument::error(ErrorKind::Num);
    }
    let seconds = hour * 3600.0 + minute * 60.0 + second;
    FormulaArgument::number((seconds % 86_400.0) / 86_400.0)
}

pub fn fn_now(ctx: &FnCtx, _args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::number(serial_from_datetime(ctx.engine.now()))
}

pub fn fn_today(ctx: &FnCtx, _args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::number(serial_from_date(ctx.engine.now().date()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Engine, FixedClock};
    use gridcalc_core::{ErrorKind, MemoryWorkbook};
    use pretty_assertions::assert_eq;

    fn eval(formula: &str) -> FormulaArgument {
        let wb = MemoryWorkbook::new();
        Engine::new(&wb).evaluate_formula("Sheet1", formula).unwrap()
    }

    fn num(formula: &str) -> f64 {
        eval(formula).as_number().unwrap()
    }

    #[test]
    fn test_serial_epoch() {
        // 1900-01-01 is serial 2 in the 1899-12-30 system
        assert_eq!(num("=DATE(1900,1,1)"), 2.0);
        assert_eq!(num("=DATE(2008,5,23)"), 39_591.0);
    }

    #[test]
    fn test_date_rollover() {
        // Month 14 rolls into the next year, day 0 into the prior month
        assert_eq!(num("=DATE(2008,14,2)"), num("=DATE(2009,2,2)"));
        assert_eq!(num("=DATE(2008,3,0)"), num("=DATE(2008,2,29)"));
        // Two-digit years are 1900-based
        assert_eq!(num("=DATE(108,1,2)"), num("=DATE(2008,1,2)"));
        assert_eq!(
            eval("=DATE(-1,1,1)"),
            FormulaArgument::error(ErrorKind::Num)
        );
    }

    #[test]
    fn test_component_extraction() {
        assert_eq!(num("=YEAR(DATE(2008,5,23))"), 2008.0);
        assert_eq!(num("=MONTH(DATE(2008,5,23))"), 5.0);
        assert_eq!(num("=DAY(DATE(2008,5,23))"), 23.0);
        assert_eq!(
            eval("=YEAR(-1)"),
            FormulaArgument::error(ErrorKind::Num)
        );
    }

    #[test]
    fn test_datevalue() {
        assert_eq!(num("=DATEVALUE(\"2008-05-23\")"), num("=DATE(2008,5,23)"));
        assert_eq!(num("=DATEVALUE(\"5/23/2008\")"), num("=DATE(2008,5,23)"));
        assert_eq!(
            eval("=DATEVALUE(\"not a date\")").error_kind(),
            Some(ErrorKind::Value)
        );
    }

    #[test]
    fn test_days_edate_eomonth() {
        assert_eq!(num("=DAYS(DATE(2011,3,15),DATE(2011,2,1))"), 42.0);
        assert_eq!(num("=EDATE(DATE(2011,1,31),1)"), num("=DATE(2011,2,28)"));
        assert_eq!(num("=EDATE(DATE(2011,1,15),-1)"), num("=DATE(2010,12,15)"));
        assert_eq!(num("=EOMONTH(DATE(2011,1,1),0)"), num("=DATE(2011,1,31)"));
        assert_eq!(num("=EOMONTH(DATE(2011,1,1),-3)"), num("=DATE(2010,10,31)"));
    }

    #[test]
    fn test_weekday() {
        // 2008-05-23 is a Friday
        assert_eq!(num("=WEEKDAY(DATE(2008,5,23))"), 6.0);
        assert_eq!(num("=WEEKDAY(DATE(2008,5,23),2)"), 5.0);
        assert_eq!(num("=WEEKDAY(DATE(2008,5,23),3)"), 4.0);
        // Sunday under each numbering
        assert_eq!(num("=WEEKDAY(DATE(2008,5,25))"), 1.0);
        assert_eq!(num("=WEEKDAY(DATE(2008,5,25),2)"), 7.0);
    }

    #[test]
    fn test_time_components() {
        let serial = num("=TIME(13,30,45)");
        assert!((serial - (13.0 * 3600.0 + 30.0 * 60.0 + 45.0) / 86_400.0).abs() < 1e-12);
        assert_eq!(num("=HOUR(TIME(13,30,45))"), 13.0);
        assert_eq!(num("=MINUTE(TIME(13,30,45))"), 30.0);
        assert_eq!(num("=SECOND(TIME(13,30,45))"), 45.0);
        // Hours wrap at 24
        assert_eq!(num("=TIME(25,0,0)"), 1.0 / 24.0);
    }

    #[test]
    fn test_now_today_use_engine_clock() {
        let wb = MemoryWorkbook::new();
        let noon = NaiveDate::from_ymd_opt(2020, 6, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let engine = Engine::new(&wb).with_clock(Box::new(FixedClock(noon)));
        let eval = |f: &str| engine.evaluate_formula("Sheet1", f).unwrap();
        let today = serial_from_date(noon.date());
        assert_eq!(eval("=TODAY()"), FormulaArgument::number(today));
        assert_eq!(eval("=NOW()"), FormulaArgument::number(today + 0.5));
        assert_eq!(eval("=YEAR(NOW())"), FormulaArgument::number(2020.0));
    }
}
