//! Library-level tests for a full session: load → chunk → index → turns,
//! with in-process fakes for the embedding and chat services.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use doc_concierge::config::Config;
use doc_concierge::embedding::EmbeddingProvider;
use doc_concierge::error::{StartupError, TurnError};
use doc_concierge::llm::{ChatMessage, ChatModel};
use doc_concierge::models::{AnswerMode, Role, StructuredResponse};
use doc_concierge::page::resolve_page;
use doc_concierge::prompts::REWRITE_INSTRUCTION;
use doc_concierge::render::{format_for_display, label_with_page, render_conversation};
use doc_concierge::session::{Services, Session};
use doc_concierge::sources::{load_directory, LoaderRegistry};

const VOCAB: &[&str] = &["leave", "vacation", "onboarding", "laptop", "salary"];

/// Bag-of-keywords embedder; remembers every text it was asked to embed.
#[derive(Default)]
struct KeywordEmbedder {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.seen.lock().unwrap().extend(texts.iter().cloned());
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                let mut v: Vec<f32> = VOCAB
                    .iter()
                    .map(|w| lower.matches(w).count() as f32)
                    .collect();
                v.push(0.01);
                v
            })
            .collect())
    }
}

/// Answers rewrite requests with a fixed query and answer requests with
/// whatever `answer` holds; `None` makes answer generation fail.
struct ScriptedChat {
    rewrite: String,
    answer: Mutex<Option<String>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChat {
    fn new(rewrite: &str, answer: Option<&str>) -> Self {
        Self {
            rewrite: rewrite.to_string(),
            answer: Mutex::new(answer.map(str::to_string)),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn set_answer(&self, answer: Option<&str>) {
        *self.answer.lock().unwrap() = answer.map(str::to_string);
    }

    fn rewrite_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m[0].content == REWRITE_INSTRUCTION)
            .count()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        if messages[0].content == REWRITE_INSTRUCTION {
            return Ok(self.rewrite.clone());
        }
        match self.answer.lock().unwrap().clone() {
            Some(answer) => Ok(answer),
            None => bail!("upstream 503"),
        }
    }
}

fn write_corpus(root: &Path) {
    fs::create_dir_all(root.join("hr")).unwrap();
    fs::write(
        root.join("hr").join("leave.md"),
        "Leave policy\nEmployees receive 20 days of paid leave per year.",
    )
    .unwrap();
    fs::write(
        root.join("onboarding.txt"),
        "Onboarding checklist\nLaptop pickup on day one.",
    )
    .unwrap();
}

fn config_for(root: &Path) -> Config {
    toml::from_str(&format!(
        "[sources]\nroot = {:?}\n[chunking]\nchunk_size = 200\nchunk_overlap = 20\n[retrieval]\ntop_k = 2\n",
        root.to_string_lossy()
    ))
    .unwrap()
}

async fn start(
    tmp: &TempDir,
    chat: Arc<ScriptedChat>,
) -> (Session, Arc<KeywordEmbedder>, Config) {
    write_corpus(tmp.path());
    let config = config_for(tmp.path());
    let embedder = Arc::new(KeywordEmbedder::default());
    let services = Services {
        embedder: embedder.clone(),
        chat,
    };
    let session = Session::initialize(&config, services).await.unwrap();
    (session, embedder, config)
}

#[tokio::test]
async fn test_search_turn_points_at_best_document() {
    let tmp = TempDir::new().unwrap();
    let chat = Arc::new(ScriptedChat::new("unused", Some("The leave policy.")));
    let (mut session, _, _) = start(&tmp, chat.clone()).await;

    assert_eq!(session.mode(), AnswerMode::Search);
    assert_eq!(session.retriever().len(), 2);

    let response = session.get_response("leave").await.unwrap();
    let StructuredResponse::SearchHit(hit) = &response else {
        panic!("expected a hit, got {:?}", response);
    };
    assert!(hit.main.source.ends_with("leave.md"));
    assert_eq!(hit.main.page, None);
    let subs = &hit.sub.as_ref().unwrap().choices;
    assert_eq!(subs.len(), 1);
    assert!(subs[0].source.ends_with("onboarding.txt"));

    // First turn has no history, so no rewrite call
    assert_eq!(chat.rewrite_calls(), 0);
    assert_eq!(session.turns().len(), 2);
    assert_eq!(session.turns()[0].role, Role::User);
    assert_eq!(session.exchanges()[0].answer, "The leave policy.");
}

#[tokio::test]
async fn test_follow_up_is_rewritten_before_retrieval() {
    let tmp = TempDir::new().unwrap();
    let chat = Arc::new(ScriptedChat::new(
        "laptop onboarding",
        Some("Pick up your laptop on day one."),
    ));
    let (mut session, embedder, _) = start(&tmp, chat.clone()).await;
    session.set_mode(AnswerMode::Inquiry);

    session.get_response("leave").await.unwrap();
    let response = session.get_response("and on the first day?").await.unwrap();

    assert_eq!(chat.rewrite_calls(), 1);
    assert!(embedder
        .seen
        .lock()
        .unwrap()
        .iter()
        .any(|t| t == "laptop onboarding"));

    let StructuredResponse::Inquiry(answer) = &response else {
        panic!("expected inquiry, got {:?}", response);
    };
    assert_eq!(answer.answer, "Pick up your laptop on day one.");
    let sources = answer.sources.as_ref().unwrap();
    assert!(sources.items[0].source.ends_with("onboarding.txt"));

    // The answer prompt ends with the unrewritten input
    let calls = chat.calls.lock().unwrap();
    let last = calls.last().unwrap();
    assert_eq!(last.last().unwrap().content, "and on the first day?");
    assert_eq!(last.len(), 4);

    assert_eq!(session.exchanges().len(), 2);
    assert_eq!(session.turns().len(), 4);
}

#[tokio::test]
async fn test_no_match_sentinels() {
    let tmp = TempDir::new().unwrap();
    let chat = Arc::new(ScriptedChat::new("salary", None));
    let (mut session, _, config) = start(&tmp, chat.clone()).await;

    chat.set_answer(Some(config.answer.no_doc_match_answer.as_str()));
    let response = session.get_response("salary bands").await.unwrap();
    assert_eq!(
        response,
        StructuredResponse::SearchNoMatch {
            message: config.answer.no_doc_match_message.clone()
        }
    );

    session.set_mode(AnswerMode::Inquiry);
    chat.set_answer(Some(config.answer.inquiry_no_match_answer.as_str()));
    let StructuredResponse::Inquiry(answer) = session.get_response("salary bands?").await.unwrap()
    else {
        panic!("expected inquiry");
    };
    assert!(answer.sources.is_none());
    assert_eq!(answer.answer, config.answer.inquiry_no_match_answer);
}

#[tokio::test]
async fn test_failed_turn_leaves_history_intact() {
    let tmp = TempDir::new().unwrap();
    let chat = Arc::new(ScriptedChat::new("leave", Some("Leave policy.")));
    let (mut session, _, _) = start(&tmp, chat.clone()).await;

    session.get_response("leave").await.unwrap();
    let before = session.turns().to_vec();

    chat.set_answer(None);
    let err = session.get_response("leave again").await.unwrap_err();
    assert!(matches!(err, TurnError::Generation(_)));
    assert!(!err.user_message().contains("503"));
    assert_eq!(session.turns(), before.as_slice());
    assert_eq!(session.exchanges().len(), 1);

    // The session stays usable
    chat.set_answer(Some("Leave policy."));
    session.get_response("leave once more").await.unwrap();
    assert_eq!(session.exchanges().len(), 2);
}

#[tokio::test]
async fn test_replayed_history_renders_like_live_output() {
    let tmp = TempDir::new().unwrap();
    let chat = Arc::new(ScriptedChat::new("leave", Some("Leave policy.")));
    let (mut session, _, _) = start(&tmp, chat).await;

    let live = format_for_display(&session.get_response("leave").await.unwrap()).to_string();
    let replay = render_conversation(session.turns());
    assert!(replay.contains(&live));
}

#[tokio::test]
async fn test_no_supported_files_is_empty_index() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("image.png"), [0u8; 8]).unwrap();
    fs::write(tmp.path().join("blank.txt"), "\n\n\n").unwrap();
    let config = config_for(tmp.path());
    let services = Services {
        embedder: Arc::new(KeywordEmbedder::default()),
        chat: Arc::new(ScriptedChat::new("", Some(""))),
    };
    let err = Session::initialize(&config, services).await.err().unwrap();
    assert!(matches!(err, StartupError::EmptyIndex));
}

#[tokio::test]
async fn test_missing_root_is_source_tree_error() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(&tmp.path().join("absent"));
    let services = Services {
        embedder: Arc::new(KeywordEmbedder::default()),
        chat: Arc::new(ScriptedChat::new("", Some(""))),
    };
    let err = Session::initialize(&config, services).await.err().unwrap();
    assert!(matches!(err, StartupError::SourceTree { .. }));
}

fn two_page_pdf() -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in ["Leave policy", "Onboarding checklist"] {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => 2,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

#[test]
fn test_pdf_pages_get_one_based_labels() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("handbook.pdf"), two_page_pdf()).unwrap();
    let config = config_for(tmp.path());

    let docs = load_directory(&config.sources, &LoaderRegistry::default()).unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[1].metadata["page"], 1);
    assert_eq!(docs[1].metadata["total_pages"], 2);

    let page = resolve_page(&docs[1].metadata);
    assert_eq!(page, Some(2));
    let source = docs[1].source().unwrap();
    assert!(label_with_page(source, page).ends_with("handbook.pdf (page 2)"));
}
