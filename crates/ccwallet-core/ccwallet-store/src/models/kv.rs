use diesel::prelude::*;

use crate::schema::kv;

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = kv)]
pub struct KvRow {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = kv)]
pub struct NewKvRow<'a> {
    pub key: &'a str,
    pub value: &'a str,
}
