use axum::body::Bytes;
use axum_typed_multipart::{FieldData, TryFromMultipart};
use serde::Deserialize;

/// `POST /users`: a name and one or more face images.
#[derive(TryFromMultipart)]
pub struct CreateForm {
    pub name: String,
    #[form_data(limit = "unlimited")]
    pub image: Vec<FieldData<Bytes>>,
}

/// `POST /users/search` and `POST /users/detect`: a single image.
#[derive(TryFromMultipart)]
pub struct ImageForm {
    #[form_data(limit = "unlimited")]
    pub image: FieldData<Bytes>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub cursor: Option<String>,
    pub limit: Option<usize>,
}
