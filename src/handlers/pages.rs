use axum::response::Html;

// The views are compiled into the binary; user data reaches the list page
// through `/api/users`, not server-side templating.

pub async fn index() -> Html<&'static str> {
    Html(include_str!("../../views/index.html"))
}

pub async fn users() -> Html<&'static str> {
    Html(include_str!("../../views/users.html"))
}
