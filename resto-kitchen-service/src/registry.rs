use chrono::Utc;
use diesel::{insert_into, prelude::*, update, PgConnection};
use tracing::warn;

use resto_core::error::Error;
use resto_core::models::{NewWorker, Worker, WorkerStatus};
use resto_core::schema::workers::dsl::*;

use crate::capabilities::Capabilities;

/// Registers this process under `worker_name`. A name whose row still reads
/// online (staleness-derived, so a crashed worker frees its name once the
/// staleness window elapses) is a conflict: two processes must not share an
/// identity. An offline row is flipped back online with its historical
/// `orders_processed` counter intact.
pub fn register(
    conn: &mut PgConnection,
    worker_name: &str,
    capabilities: &Capabilities,
) -> Result<Worker, Error> {
    conn.transaction::<_, Error, _>(|conn| {
        let existing = workers
            .filter(name.eq(worker_name))
            .select(Worker::as_select())
            .for_update()
            .first::<Worker>(conn)
            .optional()?;
        let now = Utc::now();

        match existing {
            None => {
                let worker = insert_into(workers)
                    .values(&NewWorker {
                        name: worker_name.to_string(),
                        worker_type: capabilities.worker_type().to_string(),
                        status: WorkerStatus::Online,
                        last_seen: now,
                        orders_processed: 0,
                        order_types: capabilities.as_strings(),
                    })
                    .returning(Worker::as_returning())
                    .get_result(conn)?;
                Ok(worker)
            }
            Some(w) if w.effective_status(now) == WorkerStatus::Online => {
                Err(Error::WorkerAlreadyOnline)
            }
            Some(w) => {
                let worker = update(workers.find(w.id))
                    .set((
                        status.eq(WorkerStatus::Online),
                        last_seen.eq(now),
                        worker_type.eq(capabilities.worker_type()),
                        order_types.eq(capabilities.as_strings()),
                    ))
                    .returning(Worker::as_returning())
                    .get_result(conn)?;
                Ok(worker)
            }
        }
    })
}

/// Refreshes `last_seen` and forces the row online. Called on a fixed
/// interval from a task decoupled from message processing.
pub fn heartbeat(conn: &mut PgConnection, worker_id: i32) -> QueryResult<()> {
    update(workers.find(worker_id))
        .set((last_seen.eq(Utc::now()), status.eq(WorkerStatus::Online)))
        .execute(conn)
        .map(|_| ())
}

/// Called once on graceful shutdown. Crashed processes skip this; the
/// staleness threshold covers them on the read path.
pub fn mark_offline(conn: &mut PgConnection, worker_id: i32) -> QueryResult<()> {
    update(workers.find(worker_id))
        .set(status.eq(WorkerStatus::Offline))
        .execute(conn)
        .map(|_| ())
}

/// Best-effort counter bump after an order reaches `ready`. The order's own
/// transition has already committed, so a failure here is logged, not fatal.
pub fn increment_processed(conn: &mut PgConnection, worker_name: &str) {
    let result = update(workers.filter(name.eq(worker_name)))
        .set(orders_processed.eq(orders_processed + 1))
        .execute(conn);
    if let Err(err) = result {
        warn!(worker = worker_name, error = %err, "failed to increment orders_processed");
    }
}
