use std::time::Duration;

use reqwest::header::HeaderMap;

use crate::{Body, Cookies, FileUpload, RequestsError, Result};

/// Per-call overrides for a single request.
///
/// Headers, cookies and timeout replace the client's values wholesale when
/// set. At most one body kind may be supplied; the one exception is form
/// data combined with files, which becomes a multipart body.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestOptions {
    pub(crate) params: Vec<(String, String)>,
    pub(crate) headers: Option<HeaderMap>,
    pub(crate) cookies: Option<Cookies>,
    pub(crate) content: Option<Vec<u8>>,
    pub(crate) data: Option<Vec<(String, String)>>,
    pub(crate) json: Option<serde_json::Value>,
    pub(crate) files: Option<Vec<FileUpload>>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) use_proxy: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            params: Vec::new(),
            headers: None,
            cookies: None,
            content: None,
            data: None,
            json: None,
            files: None,
            timeout: None,
            use_proxy: true,
        }
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one query parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Appends query parameters.
    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Replaces the client's headers for this call.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Replaces the client's cookies for this call.
    pub fn cookies<I, K, V>(mut self, cookies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.cookies = Some(
            cookies
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Raw request body.
    pub fn content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Form fields, urlencoded unless files are attached too.
    pub fn form<I, K, V>(mut self, data: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.data = Some(
            data.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn json(mut self, json: impl Into<serde_json::Value>) -> Self {
        self.json = Some(json.into());
        self
    }

    /// Attaches a file to a multipart body.
    pub fn file(mut self, file: FileUpload) -> Self {
        self.files.get_or_insert_with(Vec::new).push(file);
        self
    }

    /// Overrides the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Routes the call through the configured proxy (default) or directly.
    pub fn use_proxy(mut self, use_proxy: bool) -> Self {
        self.use_proxy = use_proxy;
        self
    }

    pub(crate) fn take_body(&mut self) -> Result<Body> {
        let content = self.content.take();
        let data = self.data.take();
        let json = self.json.take();
        let files = self.files.take();

        let supplied: Vec<&str> = [
            ("content", content.is_some()),
            ("json", json.is_some()),
            ("data", data.is_some() && files.is_none()),
            ("files", files.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect();

        if supplied.len() > 1 {
            return Err(RequestsError::InvalidRequest(format!(
                "multiple request bodies supplied: {}",
                supplied.join(", ")
            )));
        }

        let body = match (content, data, json, files) {
            (Some(raw), ..) => Body::Raw(raw),
            (_, data, _, Some(files)) => Body::Multipart {
                fields: data.unwrap_or_default(),
                files,
            },
            (_, Some(fields), ..) => Body::Form(fields),
            (_, _, Some(json), _) => Body::Json(json),
            _ => Body::Empty,
        };
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{Body, FileUpload, RequestOptions, RequestsError};

    #[test]
    fn empty_options_have_no_body_and_use_proxy() {
        let mut options = RequestOptions::new();
        assert!(options.use_proxy);
        assert_eq!(options.take_body().expect("must resolve"), Body::Empty);
    }

    #[test]
    fn single_body_kinds_resolve() {
        let mut raw = RequestOptions::new().content("abc");
        assert_eq!(raw.take_body().expect("raw"), Body::Raw(b"abc".to_vec()));

        let mut form = RequestOptions::new().form([("a", "1")]);
        assert_eq!(
            form.take_body().expect("form"),
            Body::Form(vec![("a".to_owned(), "1".to_owned())])
        );

        let mut doc = RequestOptions::new().json(json!({"k": 1}));
        assert_eq!(doc.take_body().expect("json"), Body::Json(json!({"k": 1})));
    }

    #[test]
    fn form_with_files_becomes_multipart() {
        let mut options = RequestOptions::new()
            .form([("caption", "cat")])
            .file(FileUpload::new("image", b"png".to_vec()).with_filename("cat.png"));

        match options.take_body().expect("must resolve multipart") {
            Body::Multipart { fields, files } => {
                assert_eq!(fields, vec![("caption".to_owned(), "cat".to_owned())]);
                assert_eq!(files.len(), 1);
                assert_eq!(files[0].filename.as_deref(), Some("cat.png"));
            }
            other => panic!("expected multipart, got {other:?}"),
        }
    }

    #[test]
    fn conflicting_bodies_are_rejected() {
        let mut options = RequestOptions::new().content("raw").json(json!([1]));
        let err = options.take_body().expect_err("must reject");
        match err {
            RequestsError::InvalidRequest(message) => {
                assert!(message.contains("content"));
                assert!(message.contains("json"));
            }
            other => panic!("expected invalid request, got {other:?}"),
        }

        let mut options = RequestOptions::new()
            .json(json!({}))
            .file(FileUpload::new("f", Vec::new()));
        assert!(options.take_body().is_err());
    }

    #[test]
    fn params_accumulate_in_order() {
        let options = RequestOptions::new()
            .param("a", "1")
            .params([("b", "2"), ("a", "3")]);
        assert_eq!(
            options.params,
            vec![
                ("a".to_owned(), "1".to_owned()),
                ("b".to_owned(), "2".to_owned()),
                ("a".to_owned(), "3".to_owned()),
            ]
        );
    }
}
