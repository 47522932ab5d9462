use diesel::prelude::*;
use serde::Serialize;

use super::user::User;

#[derive(Insertable, Debug, Clone, Copy)]
#[diesel(table_name = crate::schema::follows)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewFollow {
    pub user_id: i32,
    pub author_id: i32,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::follows)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Follow {
    pub id: i32,
    pub user_id: i32,
    pub author_id: i32,
}

#[derive(Serialize, Debug, Clone)]
pub struct FollowView {
    pub id: i32,
    pub user: User,
    pub author: User,
}

#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FollowStats {
    pub followers: i64,
    pub following: i64,
}
