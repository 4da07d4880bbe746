use sqlx::PgPool;
use std::marker::{self, PhantomData};

/// Typed handle to one table; queries live in `impl Table<Row>` blocks.
#[derive(Debug, Clone)]
pub struct Table<T> {
    pub pool: PgPool,
    _phantomdata: marker::PhantomData<T>,
}

impl<T> Table<T> {
    pub fn new(pool: PgPool) -> Self {
        Table {
            pool,
            _phantomdata: PhantomData,
        }
    }
}
