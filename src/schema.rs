diesel::table! {
    messages (id) {
        id -> Integer,
        body -> Text,
        username -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}
