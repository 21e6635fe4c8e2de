use lang_token::{
    DocumentSink, DocumentSource, FsStore, PictureStore,
    web::http::{self, HttpServerHandle, HttpState},
};
use lang_token_client::RemoteStore;
use serde_json::json;
use tempfile::{TempDir, tempdir};

async fn start_server(token: Option<&str>) -> (TempDir, FsStore, HttpServerHandle) {
    let tmp = tempdir().unwrap();
    let store = FsStore::with_dir(tmp.path());
    store.write_document("en.json", &json!({ "menu": { "open": "Open", "quit": "Quit" } })).unwrap();
    store.write_document("de.json", &json!({ "menu": { "open": "Öffnen" } })).unwrap();

    let state = HttpState {
        store: store.clone(),
        reference: "en.json".to_string(),
        auth: http::HttpAuth::new(token.map(str::to_string)),
    };
    let handle = http::spawn_http_server(state, "127.0.0.1:0".parse().unwrap()).await.unwrap();
    (tmp, store, handle)
}

fn base_url(handle: &HttpServerHandle) -> String {
    format!("http://{}", handle.addr())
}

#[tokio::test]
async fn lists_fetches_and_saves_documents() {
    let (_tmp, store, handle) = start_server(None).await;
    let remote = RemoteStore::new(&base_url(&handle), None).unwrap();

    remote.health().await.unwrap();
    store.store_upload("logo.png", b"png").unwrap();
    assert_eq!(remote.list_files().await.unwrap(), ["de.json", "en.json", "logo.png"]);
    assert_eq!(remote.language_files().await.unwrap(), ["de.json", "en.json"]);

    let mut document = remote.fetch("de.json").await.unwrap();
    document["menu"]["quit"] = json!("Beenden");
    remote.save("de.json", &document).await.unwrap();
    assert_eq!(
        store.read_document("de.json").unwrap(),
        json!({ "menu": { "open": "Öffnen", "quit": "Beenden" } })
    );

    handle.shutdown().await;
}

#[tokio::test]
async fn uploads_and_reports() {
    let (_tmp, store, handle) = start_server(None).await;
    let remote = RemoteStore::new(&base_url(&handle), None).unwrap();

    assert!(remote.load_pictures().await.unwrap().is_empty());
    let name = remote.upload("menu.png", b"png-bytes".to_vec()).await.unwrap();
    assert_eq!(name, "menu.png");
    let url = remote.file_url(&name).unwrap();
    assert!(url.as_str().ends_with("/file/menu.png"));

    let mut pictures = store.load_pictures().unwrap();
    pictures.insert("menu".to_string(), url.to_string());
    store.save_pictures(&pictures).unwrap();
    assert_eq!(remote.load_pictures().await.unwrap(), pictures);

    let report = remote.report("de.json", false).await.unwrap();
    assert_eq!(report.reference, "en.json");
    assert_eq!(report.target, "de");
    assert_eq!(report.missing, ["menu.quit"]);
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].tokens, ["menu.open", "menu.quit"]);
    assert_eq!(report.groups[0].picture.as_deref(), Some(url.as_str()));

    let report = remote.report("de.json", true).await.unwrap();
    assert_eq!(report.groups[0].tokens, ["menu.quit"]);

    handle.shutdown().await;
}

#[tokio::test]
async fn surfaces_server_errors() {
    let (_tmp, _store, handle) = start_server(Some("secret")).await;

    let anonymous = RemoteStore::new(&base_url(&handle), None).unwrap();
    let err = anonymous.list_files().await.unwrap_err();
    assert!(err.to_string().contains("401"), "unexpected error: {err}");

    let authorised = RemoteStore::new(&base_url(&handle), Some("secret")).unwrap();
    let err = authorised.fetch("fr.json").await.unwrap_err();
    assert!(err.to_string().contains("not found"), "unexpected error: {err}");

    handle.shutdown().await;
}
