use chrono::{DateTime, Utc};
use diesel::{insert_into, prelude::*, PgConnection};

use resto_core::schema::order_sequences::dsl::*;

/// Day key for the per-day sequence, always UTC.
pub fn sequence_date(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d").to_string()
}

/// Issues the next sequence number for `date` inside the caller's open
/// transaction. A single upsert statement lets the store's row lock
/// serialize concurrent intakes; the value is durable (part of the pending
/// transaction) before it is handed out, never cached in memory.
pub fn next_sequence(conn: &mut PgConnection, date: &str) -> QueryResult<i32> {
    insert_into(order_sequences)
        .values((seq_date.eq(date), last_seq.eq(1)))
        .on_conflict(seq_date)
        .do_update()
        .set(last_seq.eq(last_seq + 1))
        .returning(last_seq)
        .get_result(conn)
}

pub fn order_number(date: &str, seq: i32) -> String {
    format!("ORD_{}_{:03}", date, seq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn sequence_date_is_utc_compact() {
        let now = Utc.with_ymd_and_hms(2026, 8, 25, 23, 59, 59).unwrap();
        assert_eq!(sequence_date(now), "20260825");
    }

    #[test]
    fn order_number_pads_to_three_digits() {
        assert_eq!(order_number("20260825", 7), "ORD_20260825_007");
        assert_eq!(order_number("20260825", 42), "ORD_20260825_042");
        assert_eq!(order_number("20260825", 1234), "ORD_20260825_1234");
    }
}
