//! Integration tests running the session against the sled store.

use std::path::Path;
use std::sync::Arc;

use dynaorm_core::proto::{Filter, Value};
use dynaorm_core::{
    Error, QueryOptions, Registry, Session, SessionConfig, SledStore, SledStoreConfig, Table,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

struct Author;
struct Book;
struct Genre;

struct TestContext {
    session: Session,
    _dir: TempDir,
}

impl TestContext {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = open_session(dir.path(), 2).await;
        Self { session, _dir: dir }
    }

    fn authors(&self) -> Table<'_> {
        self.session.table::<Author>().unwrap()
    }

    fn books(&self) -> Table<'_> {
        self.session.table::<Book>().unwrap()
    }
}

fn setup_library_schema(registry: &Registry) {
    registry
        .model::<Author>()
        .partition_key("id")
        .field("name", |f| {
            f.not_null();
        })
        .has_many::<Book>("books", "author_id")
        .build()
        .unwrap();

    registry
        .model::<Book>()
        .partition_key("id")
        .fields(&["author_id", "year"])
        .field("title", |f| {
            f.not_null();
        })
        .belongs_to::<Author>("author", "author_id")
        .belongs_to_many::<Genre>("genres", "book_genres", "book_id", "genre_id")
        .build()
        .unwrap();

    registry
        .model::<Genre>()
        .partition_key("id")
        .fields(&["label"])
        .build()
        .unwrap();
}

async fn open_session(path: &Path, page_limit: usize) -> (Session, Arc<SledStore>) {
    let store = SledStore::open(SledStoreConfig::new(path).with_page_limit(page_limit)).unwrap();
    let store = Arc::new(store);
    let registry = Registry::new();
    setup_library_schema(&registry);

    let session = Session::new(registry, SessionConfig::new());
    session.connect(store.clone());
    session.provision().await.unwrap();
    (session, store)
}

async fn seed_library(ctx: &TestContext) {
    for (id, name) in [("a1", "Le Guin"), ("a2", "Lem")] {
        ctx.authors()
            .create([("id", id), ("name", name)])
            .await
            .unwrap();
    }
    let books = [
        ("b1", "a1", "The Dispossessed", 1974),
        ("b2", "a1", "The Lathe of Heaven", 1971),
        ("b3", "a2", "Solaris", 1961),
        ("b4", "a2", "The Cyberiad", 1965),
        ("b5", "a2", "Fiasco", 1986),
    ];
    for (id, author, title, year) in books {
        ctx.books()
            .create([
                ("id", Value::from(id)),
                ("author_id", Value::from(author)),
                ("title", Value::from(title)),
                ("year", Value::from(year)),
            ])
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_filter_and_order_across_pages() {
    let ctx = TestContext::new().await;
    seed_library(&ctx).await;

    let books = ctx
        .books()
        .find(
            &Filter::new().gte("year", 1965),
            &QueryOptions::new().order_by("year", dynaorm_core::OrderDirection::Asc),
        )
        .await
        .unwrap();
    let titles: Vec<Value> = books.iter().map(|b| b.peek("title").unwrap()).collect();
    assert_eq!(
        titles,
        vec![
            Value::from("The Cyberiad"),
            Value::from("The Lathe of Heaven"),
            Value::from("The Dispossessed"),
            Value::from("Fiasco"),
        ]
    );
}

#[tokio::test]
async fn test_has_many_and_belongs_to_includes() {
    let ctx = TestContext::new().await;
    seed_library(&ctx).await;

    let authors = ctx
        .authors()
        .all(&QueryOptions::new().with("books"))
        .await
        .unwrap();
    let counts: Vec<(Value, usize)> = authors
        .iter()
        .map(|a| (a.id().cloned().unwrap(), a.many("books").unwrap().len()))
        .collect();
    assert_eq!(counts, vec![(Value::from("a1"), 2), (Value::from("a2"), 3)]);

    let solaris = ctx
        .books()
        .find(&Filter::by("id", "b3"), &QueryOptions::new().with("author"))
        .await
        .unwrap();
    let author = solaris[0].one("author").unwrap();
    assert_eq!(author.peek("name").unwrap(), Value::from("Lem"));
}

#[tokio::test]
async fn test_junction_links_survive_queries() {
    let ctx = TestContext::new().await;
    seed_library(&ctx).await;
    let genres = ctx.session.table::<Genre>().unwrap();
    for (id, label) in [("g1", "sf"), ("g2", "satire")] {
        genres.create([("id", id), ("label", label)]).await.unwrap();
    }

    let book = ctx.books().get("b4").await.unwrap().unwrap();
    let report = book.sync::<Genre>(&ctx.session, ["g1", "g2"]).await.unwrap();
    assert_eq!(report.attached.len(), 2);

    let loaded = ctx
        .books()
        .find(&Filter::by("id", "b4"), &QueryOptions::new().with("genres"))
        .await
        .unwrap();
    let mut labels: Vec<String> = loaded[0]
        .many("genres")
        .unwrap()
        .iter()
        .filter_map(|g| g.peek("label").unwrap().as_str().map(str::to_string))
        .collect();
    labels.sort();
    assert_eq!(labels, vec!["satire", "sf"]);

    let report = book.sync::<Genre>(&ctx.session, ["g2"]).await.unwrap();
    assert_eq!(report.detached, vec![Value::from("g1")]);
    assert_eq!(
        book.linked_ids::<Genre>(&ctx.session).await.unwrap(),
        vec![Value::from("g2")]
    );
}

#[tokio::test]
async fn test_transaction_is_atomic() {
    let ctx = TestContext::new().await;
    seed_library(&ctx).await;

    let solaris = ctx.books().get("b3").await.unwrap().unwrap();
    let result = ctx
        .session
        .transaction(|tx| {
            tx.update(&solaris, [("year", 1962)])?;
            tx.create::<Book>([("id", "b6")])?;
            Ok(())
        })
        .await;
    assert!(matches!(result, Err(Error::Validation { .. })));
    assert_eq!(solaris.peek("year").unwrap(), Value::Int(1961));

    let stored = ctx.books().get("b3").await.unwrap().unwrap();
    assert_eq!(stored.peek("year").unwrap(), Value::Int(1961));
    assert!(ctx.books().get("b6").await.unwrap().is_none());

    let mut tx = ctx.session.begin();
    tx.update(&solaris, [("year", 1962)]).unwrap();
    tx.create::<Book>([("id", "b6"), ("title", "His Master's Voice")])
        .unwrap();
    let committed = tx.commit().await.unwrap();
    assert_eq!(committed.len(), 2);
    assert_eq!(committed[0].peek("year").unwrap(), Value::Int(1962));
    assert!(committed[1].is_persisted());

    let stored = ctx.books().get("b3").await.unwrap().unwrap();
    assert_eq!(stored.peek("year").unwrap(), Value::Int(1962));
    assert!(ctx.books().get("b6").await.unwrap().is_some());
}

#[tokio::test]
async fn test_records_persist_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (session, store) = open_session(dir.path(), 10).await;
        let authors = session.table::<Author>().unwrap();
        authors
            .create([("id", "a1"), ("name", "Le Guin")])
            .await
            .unwrap();
        authors.create([("id", "a2"), ("name", "Lem")]).await.unwrap();
        let mut lem = authors.get("a2").await.unwrap().unwrap();
        lem.destroy(&session).await.unwrap();
        store.flush().await.unwrap();
        session.disconnect();
    }

    let (session, _) = open_session(dir.path(), 10).await;
    let authors = session.table::<Author>().unwrap();
    let all = authors.all(&QueryOptions::new()).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].peek("name").unwrap(), Value::from("Le Guin"));
}
