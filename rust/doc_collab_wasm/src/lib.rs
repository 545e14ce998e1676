mod js_service;
mod storage;

use std::cell::RefCell;
use std::rc::Rc;

use gloo_timers::callback::Timeout;
use js_sys::{Function, Promise};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};

use doc_collab_core::{
    import_export, CommentSearch, CommentThread, DocService, Document, Error, FieldEditor, FieldEditorBuilder,
    RichText, SaveOutcome, UiConfig, Upload, UploadLink, ValidationError, Viewer,
};

pub use js_service::JsDocService;
pub use storage::LocalStorageDrafts;

use js_service::{from_js, js_error, to_js};

#[wasm_bindgen]
pub fn init_logging() {
    wasm_logger::init(wasm_logger::Config::new(log::Level::Debug));
}

#[wasm_bindgen]
pub fn rich_text_to_html(content_json: String) -> Result<String, JsValue> {
    let content = import_export::from_json(&content_json).map_err(|e| js_err(e.into()))?;
    Ok(import_export::to_html(&content))
}

#[wasm_bindgen]
pub fn html_to_rich_text(html: String) -> Result<String, JsValue> {
    import_export::to_json(&import_export::from_html(&html)).map_err(|e| js_err(e.into()))
}

fn js_err(e: Error) -> JsValue {
    js_sys::Error::new(&e.to_string()).into()
}

fn now_ms() -> u64 {
    js_sys::Date::now() as u64
}

fn parse_config(config_json: Option<String>) -> Result<UiConfig, JsValue> {
    match config_json {
        Some(json) => UiConfig::from_json(&json).map_err(|e| js_err(e.into())),
        None => Ok(UiConfig::default()),
    }
}

fn parse_content(content_json: &str) -> Result<RichText, JsValue> {
    import_export::from_json(content_json).map_err(|e| js_err(e.into()))
}

/// Borrows the value for one synchronous step. Service calls are awaited
/// between steps, never while the value is borrowed.
fn with_mut<T, R>(cell: &RefCell<T>, f: impl FnOnce(&mut T) -> Result<R, Error>) -> Result<R, Error> {
    let mut guard = cell.try_borrow_mut().map_err(|_| Error::Busy)?;
    f(&mut guard)
}

enum FieldNotice {
    Validation { field: String, message: Option<String> },
    Saved { document: Document, field: String },
}

/// Editor plus the page callbacks. Core callbacks only queue notices; they are
/// delivered once the editor is released, so a callback may call back in.
struct FieldState {
    editor: RefCell<FieldEditor<JsDocService>>,
    notices: Rc<RefCell<Vec<FieldNotice>>>,
    on_error: Option<Function>,
    on_saved: Option<Function>,
}

impl FieldState {
    fn step<R>(&self, f: impl FnOnce(&mut FieldEditor<JsDocService>) -> Result<R, Error>) -> Result<R, Error> {
        let result = with_mut(&self.editor, f);
        self.notify();
        result
    }

    fn notify(&self) {
        let notices = std::mem::take(&mut *self.notices.borrow_mut());
        for notice in notices {
            if let Err(e) = self.deliver(notice) {
                log::warn!("field callback failed: {}", e);
            }
        }
    }

    fn deliver(&self, notice: FieldNotice) -> Result<(), Error> {
        match notice {
            FieldNotice::Validation { field, message } => {
                let Some(cb) = &self.on_error else { return Ok(()) };
                let message = message.map_or(JsValue::NULL, |m| JsValue::from_str(&m));
                cb.call2(&JsValue::NULL, &JsValue::from_str(&field), &message).map_err(js_error)?;
            }
            FieldNotice::Saved { document, field } => {
                let Some(cb) = &self.on_saved else { return Ok(()) };
                cb.call2(&JsValue::NULL, &to_js(&document)?, &JsValue::from_str(&field)).map_err(js_error)?;
            }
        }
        Ok(())
    }

    async fn save(&self) -> Result<SaveOutcome, Error> {
        let (service, pending) = self.step(|f| Ok((f.service().clone(), f.prepare_save()?)))?;
        let Some(pending) = pending else {
            return Ok(SaveOutcome::Unchanged);
        };
        let result = service.save_field(&pending.document, &pending.field).await;
        self.step(|f| f.finish_save(pending, result))
    }

    async fn autosave(&self, now: u64) -> Result<SaveOutcome, Error> {
        if !self.step(|f| Ok(f.autosave_due(now)))? {
            return Ok(SaveOutcome::NotDue);
        }
        self.save().await
    }

    async fn upload(&self, upload: Upload) -> Result<UploadLink, Error> {
        let (service, doc_id) = self.step(|f| Ok((f.service().clone(), f.document().id.clone())))?;
        let result = service.upload_attachment(&doc_id, &upload).await;
        let link = self.step(|f| f.apply_upload(&upload, result))?;
        self.save().await?;
        Ok(link)
    }
}

async fn run_autosave(state: Rc<FieldState>, now: u64) {
    if let Err(e) = state.autosave(now).await {
        let field = state.step(|f| Ok(f.field().to_string())).unwrap_or_default();
        log::warn!("autosave of {} failed: {}", field, e);
    }
}

#[wasm_bindgen]
pub struct FieldEditorHandle {
    state: Rc<FieldState>,
    timer: RefCell<Option<Timeout>>,
}

#[wasm_bindgen]
impl FieldEditorHandle {
    /// `on_error(field, message | null)` and `on_saved(document, field)` are optional.
    #[wasm_bindgen(constructor)]
    pub fn new(
        service: JsValue,
        document: JsValue,
        field: String,
        required: bool,
        editing: bool,
        on_error: Option<Function>,
        on_saved: Option<Function>,
        config_json: Option<String>,
    ) -> Result<FieldEditorHandle, JsValue> {
        let config = parse_config(config_json)?;
        let document: Document = from_js(&document).map_err(js_err)?;
        let notices: Rc<RefCell<Vec<FieldNotice>>> = Rc::default();
        let mut builder = FieldEditorBuilder::new(field).required(required).editing(editing);
        if on_error.is_some() {
            let queue = notices.clone();
            builder = builder.on_error(move |field: &str, err: Option<&ValidationError>| {
                let message = err.map(|e| e.to_string());
                queue.borrow_mut().push(FieldNotice::Validation { field: field.to_string(), message });
            });
        }
        if on_saved.is_some() {
            let queue = notices.clone();
            builder = builder.on_saved(move |doc: &Document, field: &str| {
                queue.borrow_mut().push(FieldNotice::Saved { document: doc.clone(), field: field.to_string() });
            });
        }
        let editor = builder.build(JsDocService::new(service), document, &config).map_err(js_err)?;
        let state = Rc::new(FieldState { editor: RefCell::new(editor), notices, on_error, on_saved });
        // a required field that loads empty reports right away
        state.notify();
        Ok(FieldEditorHandle { state, timer: RefCell::new(None) })
    }

    /// Applies an edit and (re)arms the autosave timer. Replacing the timer cancels the previous one.
    pub fn edit(&self, content_json: String) -> Result<(), JsValue> {
        let content = parse_content(&content_json)?;
        let now = now_ms();
        let deadline = self
            .state
            .step(|f| {
                f.edit(content, now);
                Ok(f.autosave_deadline())
            })
            .map_err(js_err)?;
        let Some(deadline) = deadline else { return Ok(()) };
        let state = self.state.clone();
        let delay = deadline.saturating_sub(now).min(u32::MAX as u64) as u32;
        let timeout = Timeout::new(delay, move || spawn_local(run_autosave(state, deadline)));
        *self.timer.borrow_mut() = Some(timeout);
        Ok(())
    }

    /// Resolves to `"saved"` or `"unchanged"`.
    pub fn blur(&self) -> Promise {
        self.timer.borrow_mut().take();
        let state = self.state.clone();
        future_to_promise(async move {
            state
                .step(|f| {
                    f.cancel_autosave();
                    Ok(())
                })
                .map_err(js_err)?;
            let outcome = state.save().await.map_err(js_err)?;
            to_js(&outcome).map_err(js_err)
        })
    }

    /// Resolves to `{ data: { link } }`.
    pub fn upload_image(&self, name: String, content_type: String, bytes: Vec<u8>) -> Promise {
        self.timer.borrow_mut().take();
        let state = self.state.clone();
        future_to_promise(async move {
            let link = state.upload(Upload::new(name, content_type, bytes)).await.map_err(js_err)?;
            to_js(&link).map_err(js_err)
        })
    }

    pub fn set_editing(&self, editing: bool) -> Result<(), JsValue> {
        self.state
            .step(|f| {
                f.set_editing(editing);
                Ok(())
            })
            .map_err(js_err)
    }

    pub fn render(&self) -> Result<JsValue, JsValue> {
        self.state.step(|f| to_js(&f.render())).map_err(js_err)
    }

    pub fn document(&self) -> Result<JsValue, JsValue> {
        self.state.step(|f| to_js(f.document())).map_err(js_err)
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.step(|f| Ok(f.last_error().map(str::to_string))).ok().flatten()
    }
}

type Thread = CommentThread<JsDocService, LocalStorageDrafts>;

#[wasm_bindgen]
pub struct CommentThreadHandle {
    inner: Rc<RefCell<Thread>>,
}

impl CommentThreadHandle {
    fn step<R>(&self, f: impl FnOnce(&mut Thread) -> Result<R, Error>) -> Result<R, JsValue> {
        with_mut(&*self.inner, f).map_err(js_err)
    }
}

#[wasm_bindgen]
impl CommentThreadHandle {
    #[wasm_bindgen(constructor)]
    pub fn new(
        service: JsValue,
        document: JsValue,
        viewer: JsValue,
        topic: Option<String>,
        config_json: Option<String>,
    ) -> Result<CommentThreadHandle, JsValue> {
        let config = parse_config(config_json)?;
        let document: Document = from_js(&document).map_err(js_err)?;
        let viewer: Viewer = from_js(&viewer).map_err(js_err)?;
        let thread = CommentThread::new(JsDocService::new(service), LocalStorageDrafts, document, viewer, topic, config);
        Ok(CommentThreadHandle { inner: Rc::new(RefCell::new(thread)) })
    }

    pub fn render(&self, search: Option<String>) -> Result<JsValue, JsValue> {
        self.step(|t| to_js(&t.render(search.as_deref())))
    }

    pub fn viewer(&self) -> Result<JsValue, JsValue> {
        self.step(|t| to_js(t.viewer()))
    }

    pub fn topic(&self) -> Result<Option<String>, JsValue> {
        self.step(|t| Ok(t.topic().map(str::to_string)))
    }

    pub fn set_topic(&self, topic: Option<String>) -> Result<(), JsValue> {
        self.step(|t| {
            t.set_topic(topic);
            Ok(())
        })
    }

    /// -1 while nothing is being edited.
    pub fn editing_index(&self) -> Result<i32, JsValue> {
        self.step(|t| Ok(t.editing_index().map_or(-1, |i| i as i32)))
    }

    pub fn focus_mode(&self) -> Result<bool, JsValue> {
        self.step(|t| Ok(t.focus_mode()))
    }

    pub fn document(&self) -> Result<JsValue, JsValue> {
        self.step(|t| to_js(t.document()))
    }

    pub fn begin_edit(&self, index: usize) -> Result<(), JsValue> {
        self.step(|t| t.begin_edit(index))
    }

    pub fn edit_content(&self) -> Result<String, JsValue> {
        self.step(|t| Ok(import_export::to_json(t.edit_content())?))
    }

    pub fn set_edit_content(&self, content_json: String) -> Result<(), JsValue> {
        let content = parse_content(&content_json)?;
        self.step(|t| t.set_edit_content(content))
    }

    pub fn cancel_edit(&self) -> Result<(), JsValue> {
        self.step(|t| {
            t.cancel_edit();
            Ok(())
        })
    }

    pub fn save_edit(&self) -> Promise {
        let cell = self.inner.clone();
        future_to_promise(async move {
            let (service, pending) = with_mut(&*cell, |t| Ok((t.service().clone(), t.prepare_edit()?))).map_err(js_err)?;
            let result = service.update_comment(&pending.document, &pending.id, &pending.patch).await;
            with_mut(&*cell, |t| t.finish_edit(pending, result)).map_err(js_err)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    pub fn composer_content(&self) -> Result<String, JsValue> {
        self.step(|t| Ok(import_export::to_json(t.composer_content())?))
    }

    pub fn set_composer_content(&self, content_json: String) -> Result<(), JsValue> {
        let content = parse_content(&content_json)?;
        self.step(|t| {
            t.set_composer_content(content);
            Ok(())
        })
    }

    /// Mirrors the composer into localStorage.
    pub fn composer_blur(&self) -> Result<(), JsValue> {
        self.step(|t| t.save_draft())
    }

    pub fn submit(&self, private: bool) -> Promise {
        let cell = self.inner.clone();
        future_to_promise(async move {
            let (service, pending) =
                with_mut(&*cell, |t| Ok((t.service().clone(), t.prepare_submit(private)?))).map_err(js_err)?;
            let result = service.add_comment(&pending.document, &pending.html, &pending.topic, pending.private).await;
            with_mut(&*cell, |t| t.finish_submit(pending, result)).map_err(js_err)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Resolves to `true` when deleted, `false` when the comment has no identifier.
    pub fn delete_comment(&self, index: usize) -> Promise {
        let cell = self.inner.clone();
        future_to_promise(async move {
            let prepared = with_mut(&*cell, |t| Ok((t.service().clone(), t.prepare_delete(index)?))).map_err(js_err)?;
            let (service, Some(pending)) = prepared else {
                return Ok(JsValue::from_bool(false));
            };
            let result = service.delete_comment(&pending.document, &pending.id).await;
            with_mut(&*cell, |t| t.finish_delete(pending, result)).map_err(js_err)?;
            Ok(JsValue::from_bool(true))
        })
    }

    pub fn upload_to_composer(&self, name: String, content_type: String, bytes: Vec<u8>) -> Promise {
        let cell = self.inner.clone();
        future_to_promise(async move {
            let upload = Upload::new(name, content_type, bytes);
            let (service, doc_id) =
                with_mut(&*cell, |t| Ok((t.service().clone(), t.document().id.clone()))).map_err(js_err)?;
            let result = service.upload_attachment(&doc_id, &upload).await;
            let link = with_mut(&*cell, |t| t.apply_composer_upload(&upload, result)).map_err(js_err)?;
            to_js(&link).map_err(js_err)
        })
    }

    pub fn upload_to_edit(&self, name: String, content_type: String, bytes: Vec<u8>) -> Promise {
        let cell = self.inner.clone();
        future_to_promise(async move {
            let upload = Upload::new(name, content_type, bytes);
            let (service, doc_id) = with_mut(&*cell, |t| {
                if t.editing_index().is_none() {
                    return Err(Error::NotEditing);
                }
                Ok((t.service().clone(), t.document().id.clone()))
            })
            .map_err(js_err)?;
            let result = service.upload_attachment(&doc_id, &upload).await;
            let link = with_mut(&*cell, |t| t.apply_edit_upload(&upload, result)).map_err(js_err)?;
            to_js(&link).map_err(js_err)
        })
    }
}

#[wasm_bindgen]
#[derive(Default)]
pub struct CommentSearchHandle {
    search: CommentSearch,
}

#[wasm_bindgen]
impl CommentSearchHandle {
    #[wasm_bindgen(constructor)]
    pub fn new() -> CommentSearchHandle {
        Self::default()
    }

    pub fn query(&self) -> String {
        self.search.query().to_string()
    }

    pub fn set_query(&mut self, query: String) {
        self.search.set_query(query);
    }

    pub fn clear(&mut self) {
        self.search.clear();
    }

    /// The filter to pass to `CommentThreadHandle.render`.
    pub fn active(&self) -> Option<String> {
        self.search.active().map(str::to_string)
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use chrono::Utc;
    use doc_collab_core::{Author, Comment};
    use gloo_timers::future::TimeoutFuture;
    use js_sys::{Object, Reflect};
    use wasm_bindgen_futures::JsFuture;
    use wasm_bindgen_test::*;

    wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

    /// Service object with the given `(method, args, body)` functions.
    fn js_service(methods: &[(&str, &str, &str)]) -> Object {
        let target = Object::new();
        for (name, args, body) in methods {
            let f = Function::new_with_args(args, body);
            Reflect::set(&target, &JsValue::from_str(name), &f).unwrap();
        }
        target
    }

    /// Method body whose promise settles only when `this.release()` is called.
    const HELD: &str = "var self = this; self.calls = (self.calls || 0) + 1; \
        return new Promise(function (resolve) { self.release = function () { resolve(doc); }; });";

    fn release(target: &Object) {
        let f: Function = Reflect::get(target, &JsValue::from_str("release")).unwrap().dyn_into().unwrap();
        f.call0(&JsValue::NULL).unwrap();
    }

    fn calls(target: &Object) -> f64 {
        Reflect::get(target, &JsValue::from_str("calls")).unwrap().as_f64().unwrap_or(0.0)
    }

    fn content(text: &str) -> String {
        import_export::to_json(&RichText::paragraph(text)).unwrap()
    }

    fn rendered_content(handle: &FieldEditorHandle) -> serde_json::Value {
        let view: serde_json::Value = from_js(&handle.render().unwrap()).unwrap();
        view["content"].clone()
    }

    fn seeded_document() -> JsValue {
        let mut doc = Document::new("doc-1");
        doc.comments.push(Comment {
            id: Some("c1".into()),
            author: Author { name: "Ann".into(), email: "ann@example.com".into() },
            timestamp: Utc::now(),
            text: "<p>First pass</p>".into(),
            private: false,
            topic: String::new(),
            edits: Vec::new(),
        });
        to_js(&doc).unwrap()
    }

    fn ann() -> JsValue {
        to_js(&Viewer::new("Ann", "ann@example.com")).unwrap()
    }

    #[wasm_bindgen_test]
    fn html_bridge() {
        let json = html_to_rich_text("<p>Hi <b>there</b></p>".into()).unwrap();
        assert_eq!(rich_text_to_html(json).unwrap(), "<p>Hi <strong>there</strong></p>");
    }

    #[wasm_bindgen_test]
    fn search_handle() {
        let mut s = CommentSearchHandle::new();
        s.set_query(" ann ".into());
        assert_eq!(s.active().as_deref(), Some(" ann "));
        s.set_query("   ".into());
        assert_eq!(s.active(), None);
        s.clear();
        assert_eq!(s.query(), "");
    }

    #[wasm_bindgen_test]
    fn local_storage_drafts() {
        use doc_collab_core::DraftStore;
        let mut drafts = LocalStorageDrafts;
        drafts.save("doc_collab.test", "x");
        assert_eq!(drafts.load("doc_collab.test").as_deref(), Some("x"));
        drafts.clear("doc_collab.test");
        assert_eq!(drafts.load("doc_collab.test"), None);
    }

    #[wasm_bindgen_test]
    async fn empty_answers_are_rejections() {
        for body in ["return null;", "return undefined;", "return false;", "return Promise.resolve(null);"] {
            let service = JsDocService::new(js_service(&[("saveField", "doc, field", body)]).into());
            let err = service.save_field(&Document::new("d1"), "summary").await.unwrap_err();
            assert!(matches!(err, Error::Rejected("saveField")), "{}: {:?}", body, err);
        }
        let service = JsDocService::new(js_service(&[("saveField", "doc, field", "return doc;")]).into());
        assert_eq!(service.save_field(&Document::new("d1"), "summary").await.unwrap().id, "d1");

        let missing = JsDocService::new(Object::new().into());
        assert!(matches!(missing.save_field(&Document::new("d1"), "summary").await, Err(Error::Service(_))));
    }

    #[wasm_bindgen_test]
    async fn autosave_timer_saves_after_idle_window() {
        let target = js_service(&[(
            "saveField",
            "doc, field",
            "this.calls = (this.calls || 0) + 1; return Promise.resolve(doc);",
        )]);
        let handle = FieldEditorHandle::new(
            target.clone().into(),
            to_js(&Document::new("d1")).unwrap(),
            "summary".into(),
            false,
            true,
            None,
            None,
            Some(r#"{"autosave_delay_ms": 20}"#.into()),
        )
        .unwrap();
        handle.edit(content("a")).unwrap();
        handle.edit(content("ab")).unwrap();
        assert_eq!(calls(&target), 0.0);
        TimeoutFuture::new(100).await;
        assert_eq!(calls(&target), 1.0);

        let doc: Document = from_js(&handle.document().unwrap()).unwrap();
        assert_eq!(doc.field_content("summary").unwrap(), Some(RichText::paragraph("ab")));
    }

    #[wasm_bindgen_test]
    async fn field_accepts_edits_while_a_save_is_pending() {
        let target = js_service(&[("saveField", "doc, field", HELD)]);
        let handle = FieldEditorHandle::new(
            target.clone().into(),
            to_js(&Document::new("d1")).unwrap(),
            "summary".into(),
            false,
            true,
            None,
            None,
            None,
        )
        .unwrap();
        handle.edit(content("first")).unwrap();
        let saving = handle.blur();
        TimeoutFuture::new(0).await;
        assert_eq!(calls(&target), 1.0);

        handle.edit(content("first and more")).unwrap();
        assert!(handle.render().is_ok());
        release(&target);
        assert_eq!(JsFuture::from(saving).await.unwrap().as_string().as_deref(), Some("saved"));
        assert_eq!(rendered_content(&handle), serde_json::to_value(RichText::paragraph("first and more")).unwrap());
        assert_eq!(handle.last_error(), None);
    }

    #[wasm_bindgen_test]
    fn required_field_reports_through_page_callback() {
        let on_error = Function::new_with_args("field, message", "globalThis.__docCollabReport = [field, message];");
        let _handle = FieldEditorHandle::new(
            Object::new().into(),
            to_js(&Document::new("d1")).unwrap(),
            "summary".into(),
            true,
            true,
            Some(on_error),
            None,
            None,
        )
        .unwrap();
        let report = Reflect::get(&js_sys::global(), &JsValue::from_str("__docCollabReport")).unwrap();
        let report: Vec<Option<String>> = from_js(&report).unwrap();
        assert_eq!(report[0].as_deref(), Some("summary"));
        assert!(report[1].is_some());
    }

    #[wasm_bindgen_test]
    fn editing_index_is_minus_one_when_idle() {
        let thread = CommentThreadHandle::new(Object::new().into(), seeded_document(), ann(), None, None).unwrap();
        assert_eq!(thread.editing_index().unwrap(), -1);
        thread.begin_edit(0).unwrap();
        assert_eq!(thread.editing_index().unwrap(), 0);
        assert!(thread.focus_mode().unwrap());
        thread.cancel_edit().unwrap();
        assert_eq!(thread.editing_index().unwrap(), -1);
    }

    #[wasm_bindgen_test]
    async fn thread_stays_usable_while_an_edit_saves() {
        let target = js_service(&[("updateComment", "doc, id, patch", HELD)]);
        let thread = CommentThreadHandle::new(target.clone().into(), seeded_document(), ann(), None, None).unwrap();
        thread.begin_edit(0).unwrap();
        thread.set_edit_content(content("Second pass")).unwrap();
        let saving = thread.save_edit();
        TimeoutFuture::new(0).await;
        assert_eq!(calls(&target), 1.0);

        assert!(thread.render(None).is_ok());
        thread.set_edit_content(content("Second pass, revised")).unwrap();
        thread.set_topic(Some("t1".into())).unwrap();
        release(&target);
        JsFuture::from(saving).await.unwrap();

        assert_eq!(thread.editing_index().unwrap(), 0);
        assert_eq!(thread.edit_content().unwrap(), content("Second pass, revised"));
        assert_eq!(thread.topic().unwrap().as_deref(), Some("t1"));
    }

    #[wasm_bindgen_test]
    async fn delete_without_identifier_resolves_false() {
        let mut doc: Document = from_js(&seeded_document()).unwrap();
        doc.comments[0].id = None;
        let thread =
            CommentThreadHandle::new(Object::new().into(), to_js(&doc).unwrap(), ann(), None, None).unwrap();
        let deleted = JsFuture::from(thread.delete_comment(0)).await.unwrap();
        assert_eq!(deleted.as_bool(), Some(false));
    }
}
