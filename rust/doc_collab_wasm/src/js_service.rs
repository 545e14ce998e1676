//! `DocService` backed by a JavaScript object whose methods return promises.

use async_trait::async_trait;
use js_sys::{Array, Function, Promise, Reflect, Uint8Array};
use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

use doc_collab_core::{Attachment, CommentPatch, DocService, Document, Error, Result, Upload};

/// Expects `addComment`, `updateComment`, `deleteComment`, `saveField` and
/// `uploadAttachment`. A `null`, `undefined` or `false` answer is a rejection.
#[derive(Clone)]
pub struct JsDocService {
    target: JsValue,
}

impl JsDocService {
    pub fn new(target: JsValue) -> Self {
        Self { target }
    }

    fn method(&self, name: &str) -> Result<Function> {
        Reflect::get(&self.target, &JsValue::from_str(name))
            .ok()
            .and_then(|f| f.dyn_into::<Function>().ok())
            .ok_or_else(|| Error::Service(format!("document service has no {} method", name)))
    }

    async fn call(&self, op: &'static str, args: Array) -> Result<JsValue> {
        let f = self.method(op)?;
        let ret = f.apply(&self.target, &args).map_err(js_error)?;
        let value = JsFuture::from(Promise::resolve(&ret)).await.map_err(js_error)?;
        if value.is_null() || value.is_undefined() || value.as_bool() == Some(false) {
            return Err(Error::Rejected(op));
        }
        Ok(value)
    }
}

pub(crate) fn js_error(e: JsValue) -> Error {
    let msg = e
        .dyn_ref::<js_sys::Error>()
        .map(|err| String::from(err.message()))
        .or_else(|| e.as_string())
        .unwrap_or_else(|| format!("{:?}", e));
    Error::Service(msg)
}

pub(crate) fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue> {
    let json = serde_json::to_string(value)?;
    js_sys::JSON::parse(&json).map_err(js_error)
}

pub(crate) fn from_js<T: DeserializeOwned>(value: &JsValue) -> Result<T> {
    let json = String::from(js_sys::JSON::stringify(value).map_err(js_error)?);
    Ok(serde_json::from_str(&json)?)
}

#[async_trait(?Send)]
impl DocService for JsDocService {
    async fn add_comment(&self, doc: &Document, html: &str, topic: &str, private: bool) -> Result<Document> {
        let args = Array::of4(&to_js(doc)?, &JsValue::from_str(html), &JsValue::from_str(topic), &JsValue::from_bool(private));
        from_js(&self.call("addComment", args).await?)
    }

    async fn update_comment(&self, doc: &Document, id: &str, patch: &CommentPatch) -> Result<Document> {
        let args = Array::of3(&to_js(doc)?, &JsValue::from_str(id), &to_js(patch)?);
        from_js(&self.call("updateComment", args).await?)
    }

    async fn delete_comment(&self, doc: &Document, id: &str) -> Result<Document> {
        let args = Array::of2(&to_js(doc)?, &JsValue::from_str(id));
        from_js(&self.call("deleteComment", args).await?)
    }

    async fn save_field(&self, doc: &Document, field: &str) -> Result<Document> {
        let args = Array::of2(&to_js(doc)?, &JsValue::from_str(field));
        from_js(&self.call("saveField", args).await?)
    }

    async fn upload_attachment(&self, doc_id: &str, upload: &Upload) -> Result<Vec<Attachment>> {
        let bytes = Uint8Array::from(upload.bytes.as_slice());
        let args = Array::of4(
            &JsValue::from_str(doc_id),
            &JsValue::from_str(&upload.name),
            &JsValue::from_str(&upload.content_type),
            &bytes,
        );
        from_js(&self.call("uploadAttachment", args).await?)
    }
}
