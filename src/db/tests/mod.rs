use std::time::Duration;

use chrono::Datelike;
use hyper::{HeaderMap, Method, header};

use crate::{
    api::{
        Reply,
        err::{ApiErrorKind, ApiResult},
        model::{
            board::{Board, BoardUpdate, ParticipantInput},
            category::{Category, CategoryFilter, CategoryUpdate, NewCategory},
            comment::{Comment, CommentFilter, NewComment},
            goal::{Goal, GoalFilter, GoalUpdate, NewGoal},
            tg_user::TgUser,
            user::User,
        },
    },
    auth::{AuthConfig, AuthContext, persist_new_session},
    bot::{self, ChatState, messages},
    db::{Transaction, types::{Key, Priority, Role, Status}},
    prelude::*,
};
use self::util::{TestDb, add_user};

mod util;


fn new_goal(title: &str, category: Key) -> NewGoal {
    NewGoal {
        title: title.into(),
        description: String::new(),
        category,
        due_date: None,
        status: Status::default(),
        priority: Priority::default(),
    }
}

async fn add_category(tx: &Transaction<'_>, title: &str, board: Key, user: &User) -> Result<Key> {
    let new = NewCategory { title: title.into(), board };
    Ok(Category::create(tx, new, user).await?.id)
}

async fn add_participant(tx: &Transaction<'_>, board: Key, user: &User, role: Role) -> Result<()> {
    tx.execute(
        "insert into board_participants (board, user_id, role) values ($1, $2, $3)",
        &[&board, &user.id, &role],
    ).await?;
    Ok(())
}

fn all_goals() -> GoalFilter {
    GoalFilter::default()
}

fn error_kind(result: ApiResult<Reply>) -> ApiErrorKind {
    result.unwrap_err().kind
}

const BOT_CHAT: i64 = 4711;

/// Sends `text` to the bot from `BOT_CHAT`.
async fn send(tx: &Transaction<'_>, text: &str, state: Option<ChatState>) -> Result<bot::Outcome> {
    Ok(bot::respond(tx, BOT_CHAT, text, state, 8).await?)
}


#[tokio::test(flavor = "multi_thread")]
async fn creator_owns_new_board() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let mut conn = db.conn().await?;
    let tx = Transaction::new(conn.transaction().await?);

    let alice = add_user(&tx, "alice").await?;
    let board = Board::create(&tx, "  Household ", &alice).await?;
    assert_eq!(board.title, "Household");
    assert!(!board.is_deleted);

    let detail = Board::load(&tx, board.id, &alice).await?;
    assert_eq!(detail.participants.len(), 1);
    assert_eq!(detail.participants[0].user, "alice");
    assert_eq!(detail.participants[0].role, Role::Owner);

    let listing = Board::list(&tx, &alice, None).await?;
    assert_eq!(listing.total, 1);
    assert_eq!(listing.items[0].id, board.id);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn visibility_before_permission() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let mut conn = db.conn().await?;
    let tx = Transaction::new(conn.transaction().await?);

    let alice = add_user(&tx, "alice").await?;
    let bob = add_user(&tx, "bob").await?;
    let carol = add_user(&tx, "carol").await?;
    let board = Board::create(&tx, "Garden", &alice).await?;
    add_participant(&tx, board.id, &bob, Role::Reader).await?;
    let category = add_category(&tx, "Plants", board.id, &alice).await?;

    // Readers see everything, but cannot change anything.
    assert_eq!(Category::load(&tx, category, &bob).await?.title, "Plants");
    let err = add_category(&tx, "Weeds", board.id, &bob).await.unwrap_err();
    let err = err.downcast::<crate::api::err::ApiError>()?;
    assert_eq!(err.kind, ApiErrorKind::PermissionDenied);
    let err = Board::delete(&tx, board.id, &bob).await.unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::PermissionDenied);

    // Others do not even see the objects.
    let err = Category::load(&tx, category, &carol).await.unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::NotFound);
    let err = Board::delete(&tx, board.id, &carol).await.unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::NotFound);
    assert_eq!(Board::list(&tx, &carol, None).await?.total, 0);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn replace_participants() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let mut conn = db.conn().await?;
    let tx = Transaction::new(conn.transaction().await?);

    let alice = add_user(&tx, "alice").await?;
    add_user(&tx, "bob").await?;
    add_user(&tx, "carol").await?;
    let board = Board::create(&tx, "Trip", &alice).await?;

    let participant = |user: &str, role| ParticipantInput { user: user.into(), role };
    let update = |participants| BoardUpdate { title: None, participants: Some(participants) };

    let detail = Board::update(&tx, board.id, &alice, update(vec![
        participant("bob", Role::Writer),
        participant("carol", Role::Reader),
        participant("bob", Role::Reader),
    ])).await?;
    let roles = detail.participants.iter()
        .map(|p| (p.user.as_str(), p.role))
        .collect::<Vec<_>>();
    assert_eq!(roles, [("alice", Role::Owner), ("bob", Role::Writer), ("carol", Role::Reader)]);

    // The owner cannot be changed, nor can anyone become owner.
    let err = Board::update(&tx, board.id, &alice, update(vec![participant("alice", Role::Reader)]))
        .await
        .unwrap_err();
    assert!(err.is_about_field("participants"));
    let err = Board::update(&tx, board.id, &alice, update(vec![participant("bob", Role::Owner)]))
        .await
        .unwrap_err();
    assert!(err.is_about_field("participants"));
    let err = Board::update(&tx, board.id, &alice, update(vec![participant("dave", Role::Reader)]))
        .await
        .unwrap_err();
    assert!(err.is_about_field("participants"));

    // Replacing with an empty list leaves only the owner and bumps `updated`.
    tx.batch_execute("alter table boards disable trigger boards_updated").await?;
    tx.execute(
        "update boards set updated = '2000-01-01T00:00:00Z' where id = $1",
        &[&board.id],
    ).await?;
    tx.batch_execute("alter table boards enable trigger boards_updated").await?;

    let detail = Board::update(&tx, board.id, &alice, update(vec![])).await?;
    assert_eq!(detail.participants.len(), 1);
    assert_eq!(detail.participants[0].user, "alice");
    assert!(detail.board.updated.year() > 2000);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn deleting_board_cascades() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let mut conn = db.conn().await?;
    let tx = Transaction::new(conn.transaction().await?);

    let alice = add_user(&tx, "alice").await?;
    let doomed = Board::create(&tx, "Doomed", &alice).await?;
    let other = Board::create(&tx, "Other", &alice).await?;
    let doomed_cat = add_category(&tx, "A", doomed.id, &alice).await?;
    let other_cat = add_category(&tx, "B", other.id, &alice).await?;
    let doomed_goal = Goal::create(&tx, new_goal("Doomed goal", doomed_cat), &alice).await?;
    let other_goal = Goal::create(&tx, new_goal("Other goal", other_cat), &alice).await?;

    Board::delete(&tx, doomed.id, &alice).await?;

    assert_eq!(Board::load(&tx, doomed.id, &alice).await.unwrap_err().kind, ApiErrorKind::NotFound);
    assert_eq!(Category::load(&tx, doomed_cat, &alice).await.unwrap_err().kind, ApiErrorKind::NotFound);
    assert_eq!(Goal::load(&tx, doomed_goal.id, &alice).await.unwrap_err().kind, ApiErrorKind::NotFound);

    let status: Status = tx.query_one("select status from goals where id = $1", &[&doomed_goal.id])
        .await?
        .get(0);
    assert_eq!(status, Status::Archived);

    // The other board is untouched.
    assert_eq!(Goal::load(&tx, other_goal.id, &alice).await?.status, Status::ToDo);
    let goals = Goal::list(&tx, &alice, all_goals(), Goal::DEFAULT_ORDER, None).await?;
    assert_eq!(goals.items.iter().map(|g| g.id).collect::<Vec<_>>(), [other_goal.id]);
    let categories = Category::list(
        &tx,
        &alice,
        CategoryFilter::default(),
        Category::DEFAULT_ORDER,
        None,
    ).await?;
    assert_eq!(categories.items.iter().map(|c| c.id).collect::<Vec<_>>(), [other_cat]);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn deleted_targets_are_rejected() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let mut conn = db.conn().await?;
    let tx = Transaction::new(conn.transaction().await?);

    let alice = add_user(&tx, "alice").await?;
    let board = Board::create(&tx, "Old", &alice).await?;
    let live = Board::create(&tx, "Live", &alice).await?;
    let category = add_category(&tx, "Stuff", live.id, &alice).await?;
    Board::delete(&tx, board.id, &alice).await?;

    let err = Category::create(&tx, NewCategory { title: "X".into(), board: board.id }, &alice)
        .await
        .unwrap_err();
    assert!(err.is_about_field("board"));

    let err = Category::update(&tx, category, &alice, CategoryUpdate {
        title: None,
        board: Some(board.id),
    }).await.unwrap_err();
    assert!(err.is_about_field("board"));

    Category::delete(&tx, category, &alice).await?;
    let err = Goal::create(&tx, new_goal("Nope", category), &alice).await.unwrap_err();
    assert!(err.is_about_field("category"));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn goal_filters_and_archiving() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let mut conn = db.conn().await?;
    let tx = Transaction::new(conn.transaction().await?);

    let alice = add_user(&tx, "alice").await?;
    let board = Board::create(&tx, "Work", &alice).await?;
    let category = add_category(&tx, "Tasks", board.id, &alice).await?;

    let date = |d| chrono::NaiveDate::from_ymd_opt(2024, 5, d);
    let mut urgent = new_goal("Write report", category);
    urgent.priority = Priority::Critical;
    urgent.due_date = date(3);
    let urgent = Goal::create(&tx, urgent, &alice).await?;
    let mut later = new_goal("Clean desk", category);
    later.description = "Also the drawer".into();
    later.due_date = date(20);
    let later = Goal::create(&tx, later, &alice).await?;

    let ids = |listing: crate::api::model::Listing<Goal>| {
        listing.items.into_iter().map(|g| g.id).collect::<Vec<_>>()
    };

    let filter = GoalFilter { priorities: Some(vec![Priority::Critical]), ..all_goals() };
    assert_eq!(ids(Goal::list(&tx, &alice, filter, Goal::DEFAULT_ORDER, None).await?), [urgent.id]);

    let filter = GoalFilter { due_before: date(10), ..all_goals() };
    assert_eq!(ids(Goal::list(&tx, &alice, filter, Goal::DEFAULT_ORDER, None).await?), [urgent.id]);

    let filter = GoalFilter { search: Some("DRAWER".into()), ..all_goals() };
    assert_eq!(ids(Goal::list(&tx, &alice, filter, Goal::DEFAULT_ORDER, None).await?), [later.id]);

    // Default ordering is by title.
    let all = Goal::list(&tx, &alice, all_goals(), Goal::DEFAULT_ORDER, None).await?;
    assert_eq!(ids(all), [later.id, urgent.id]);

    // Removing the due date and archiving through an update.
    let updated = Goal::update(&tx, later.id, &alice, GoalUpdate {
        due_date: Some(None),
        status: Some(Status::InProgress),
        ..GoalUpdate::default()
    }).await?;
    assert_eq!(updated.due_date, None);
    assert_eq!(updated.status, Status::InProgress);
    assert_eq!(updated.title, "Clean desk");

    Goal::delete(&tx, urgent.id, &alice).await?;
    let all = Goal::list(&tx, &alice, all_goals(), Goal::DEFAULT_ORDER, None).await?;
    assert_eq!(ids(all), [later.id]);
    assert_eq!(Goal::list_by_author(&tx, &alice).await?.len(), 1);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn comments_belong_to_their_author() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let mut conn = db.conn().await?;
    let tx = Transaction::new(conn.transaction().await?);

    let alice = add_user(&tx, "alice").await?;
    let bob = add_user(&tx, "bob").await?;
    let board = Board::create(&tx, "Shared", &alice).await?;
    add_participant(&tx, board.id, &bob, Role::Writer).await?;
    let category = add_category(&tx, "Ideas", board.id, &alice).await?;
    let goal = Goal::create(&tx, new_goal("Paint fence", category), &alice).await?;

    let comment = Comment::create(&tx, NewComment { goal: goal.id, text: "Blue?".into() }, &bob)
        .await?;
    assert_eq!(comment.user.username, "bob");

    // Alice can read, but not change Bob's comment.
    assert_eq!(Comment::load(&tx, comment.id, &alice).await?.text, "Blue?");
    let err = Comment::update(&tx, comment.id, &alice, "Red!").await.unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::PermissionDenied);
    let err = Comment::delete(&tx, comment.id, &alice).await.unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::PermissionDenied);

    assert_eq!(Comment::update(&tx, comment.id, &bob, "Green!").await?.text, "Green!");
    let filter = CommentFilter { goal: Some(goal.id) };
    let listing = Comment::list(&tx, &alice, filter, Comment::DEFAULT_ORDER, None).await?;
    assert_eq!(listing.total, 1);

    Comment::delete(&tx, comment.id, &bob).await?;
    assert_eq!(Comment::load(&tx, comment.id, &bob).await.unwrap_err().kind, ApiErrorKind::NotFound);

    // Archived goals cannot be commented on.
    Goal::delete(&tx, goal.id, &alice).await?;
    let err = Comment::create(&tx, NewComment { goal: goal.id, text: "Late".into() }, &bob)
        .await
        .unwrap_err();
    assert!(err.is_about_field("goal"));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn telegram_verification() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let mut conn = db.conn().await?;
    let tx = Transaction::new(conn.transaction().await?);

    let alice = add_user(&tx, "alice").await?;
    let mut tg_user = TgUser::get_or_create(&tx, 4711).await?;
    assert!(!tg_user.is_verified());
    assert_eq!(TgUser::get_or_create(&tx, 4711).await?.id, tg_user.id);

    let old_code = tg_user.renew_verification_code(&tx, 8).await?;
    let code = tg_user.renew_verification_code(&tx, 8).await?;
    assert_eq!(code.len(), 8);

    let err = TgUser::verify(&tx, &old_code, &alice).await.unwrap_err();
    assert!(err.is_about_field("verification_code"));

    let verified = TgUser::verify(&tx, &code, &alice).await?;
    assert_eq!(verified.chat_id, 4711);
    assert_eq!(verified.user, Some(alice.id));
    assert_eq!(verified.verification_code, None);

    let linked = TgUser::get_or_create(&tx, 4711).await?.linked_user(&tx).await?;
    assert_eq!(linked.map(|u| u.username).as_deref(), Some("alice"));

    // Codes are single use.
    assert!(TgUser::verify(&tx, &code, &alice).await.is_err());

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn sessions() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let mut conn = db.conn().await?;
    let tx = Transaction::new(conn.transaction().await?);

    let alice = add_user(&tx, "alice").await?;
    let config = AuthConfig {
        session_duration: Duration::from_secs(60),
        secure_cookie: true,
    };

    let session = persist_new_session(&tx, &alice).await?;
    let cookie = session.set_cookie(&config);
    let mut headers = HeaderMap::new();
    headers.insert(header::COOKIE, format!("{}={}", cookie.name(), cookie.value()).parse()?);

    let auth = AuthContext::new(&headers, &config, &tx).await?;
    assert_eq!(auth.user().map(|u| u.id), Some(alice.id));

    // Expired sessions are ignored.
    tx.execute("update user_sessions set created = now() - interval '2 minutes'", &[]).await?;
    let auth = AuthContext::new(&headers, &config, &tx).await?;
    assert!(auth.user().is_none());

    // Logging out removes the session.
    assert_eq!(session.remove_from_db(&tx).await?.as_deref(), Some("alice"));
    assert_eq!(session.remove_from_db(&tx).await?, None);

    // Wrong password, wrong user.
    let wrong = secrecy::SecretString::from("wrong horse battery staple".to_owned());
    assert!(User::authenticate(&tx, "alice", &wrong).await?.is_none());
    assert!(User::authenticate(&tx, "nobody", &wrong).await?.is_none());

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn updates_check_object_before_body() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let mut conn = db.conn().await?;
    let tx = Transaction::new(conn.transaction().await?);

    let alice = add_user(&tx, "alice").await?;
    let bob = add_user(&tx, "bob").await?;
    let carol = add_user(&tx, "carol").await?;
    let board = Board::create(&tx, "Garden", &alice).await?;
    add_participant(&tx, board.id, &bob, Role::Reader).await?;
    let category = add_category(&tx, "Plants", board.id, &alice).await?;
    let goal = Goal::create(&tx, new_goal("Water roses", category), &alice).await?;
    let comment = Comment::create(&tx, NewComment { goal: goal.id, text: "Daily".into() }, &alice)
        .await?;
    tx.commit().await?;

    let paths = [
        format!("/goals/board/{}", board.id),
        format!("/goals/goal_category/{category}"),
        format!("/goals/goal/{}", goal.id),
        format!("/goals/goal_comment/{}", comment.id),
    ];
    for path in &paths {
        for body in ["{}", "{bad"] {
            let result = db.api(Some(&carol), Method::PUT, path, body).await?;
            assert_eq!(error_kind(result), ApiErrorKind::NotFound, "PUT {path} {body}");
            let result = db.api(Some(&bob), Method::PATCH, path, body).await?;
            assert_eq!(error_kind(result), ApiErrorKind::PermissionDenied, "PATCH {path} {body}");
        }
    }

    // Objects that don't exist at all.
    let result = db.api(Some(&alice), Method::PUT, "/goals/board/999999", "{}").await?;
    assert_eq!(error_kind(result), ApiErrorKind::NotFound);

    // Only with permission is the body validated.
    let err = db.api(Some(&alice), Method::PUT, &paths[0], "{}").await?.unwrap_err();
    assert!(err.is_about_field("title"));
    let err = db.api(Some(&alice), Method::PATCH, &paths[1], "{bad").await?.unwrap_err();
    assert_eq!(err.status(), hyper::StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn authentication_before_method() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let mut conn = db.conn().await?;
    let tx = Transaction::new(conn.transaction().await?);
    let alice = add_user(&tx, "alice").await?;
    tx.commit().await?;

    let result = db.api(None, Method::GET, "/goals/board/list", "").await?;
    assert_eq!(error_kind(result), ApiErrorKind::NotAuthenticated);
    let result = db.api(None, Method::DELETE, "/goals/board/create", "").await?;
    assert_eq!(error_kind(result), ApiErrorKind::NotAuthenticated);

    let result = db.api(Some(&alice), Method::DELETE, "/goals/board/create", "").await?;
    assert_eq!(error_kind(result), ApiErrorKind::MethodNotAllowed);
    let result = db.api(None, Method::GET, "/core/login/", "").await?;
    assert_eq!(error_kind(result), ApiErrorKind::MethodNotAllowed);

    let reply = db.api(Some(&alice), Method::GET, "/goals/board/list/", "").await??;
    assert_eq!(reply.body, Some(serde_json::json!([])));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn participants_over_api() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let mut conn = db.conn().await?;
    let tx = Transaction::new(conn.transaction().await?);
    let alice = add_user(&tx, "alice").await?;
    let bob = add_user(&tx, "bob").await?;
    let board = Board::create(&tx, "Flat", &alice).await?;
    tx.commit().await?;

    let path = format!("/goals/board/{}", board.id);
    let body = r#"{"participants": [{"role": 2, "user": "bob"}]}"#;
    let reply = db.api(Some(&alice), Method::PATCH, &path, body).await??;
    assert_eq!(reply.status, hyper::StatusCode::OK);
    let body = reply.body.unwrap();
    assert_eq!(body["title"], "Flat");
    let participants = body["participants"].as_array().unwrap();
    assert_eq!(participants.len(), 2);
    assert_eq!(participants[1]["user"], "bob");
    assert_eq!(participants[1]["role"], 2);

    // Bob is a writer now, but still cannot manage the board.
    let category = format!(r#"{{"title": "Kitchen", "board": {}}}"#, board.id);
    let reply = db.api(Some(&bob), Method::POST, "/goals/goal_category/create", &category)
        .await??;
    assert_eq!(reply.status, hyper::StatusCode::CREATED);
    let result = db.api(Some(&bob), Method::PATCH, &path, r#"{"participants": []}"#).await?;
    assert_eq!(error_kind(result), ApiErrorKind::PermissionDenied);

    // `PUT` needs the title, and nothing is changed without it.
    let err = db.api(Some(&alice), Method::PUT, &path, r#"{"participants": []}"#)
        .await?
        .unwrap_err();
    assert!(err.is_about_field("title"));
    let reply = db.api(Some(&alice), Method::GET, &path, "").await??;
    assert_eq!(reply.body.unwrap()["participants"].as_array().unwrap().len(), 2);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn bot_dialog() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let mut conn = db.conn().await?;
    let tx = Transaction::new(conn.transaction().await?);
    let alice = add_user(&tx, "alice").await?;

    // Unverified chats only get a verification code, whatever they send.
    let outcome = send(&tx, "/goals", None).await?;
    let code: String = tx
        .query_one("select verification_code from tg_users where chat_id = $1", &[&BOT_CHAT])
        .await?
        .get(0);
    assert_eq!(outcome.reply, Some(messages::verify_with_code(&code)));
    assert_eq!(outcome.next_state, None);
    TgUser::verify(&tx, &code, &alice).await?;

    // Text outside of a dialog is ignored.
    let outcome = send(&tx, "hello", None).await?;
    assert_eq!(outcome.reply, None);
    assert_eq!(outcome.next_state, None);

    let outcome = send(&tx, "/create", None).await?;
    assert_eq!(outcome.reply.as_deref(), Some(messages::NO_CATEGORIES));
    assert_eq!(outcome.next_state, None);

    let board = Board::create(&tx, "Home", &alice).await?;
    let category = add_category(&tx, "Chores", board.id, &alice).await?;

    let outcome = send(&tx, "/create", None).await?;
    let select = ChatState::SelectCategory { offered: vec![category] };
    assert_eq!(outcome.reply, Some(format!("{}\n{category}) Chores", messages::SELECT_CATEGORY)));
    assert_eq!(outcome.next_state, Some(select.clone()));

    let outcome = send(&tx, "999", Some(select.clone())).await?;
    assert_eq!(outcome.reply.as_deref(), Some(messages::CATEGORY_DOES_NOT_EXIST));
    assert_eq!(outcome.next_state, Some(select.clone()));

    let outcome = send(&tx, &category.to_string(), Some(select.clone())).await?;
    let enter_title = ChatState::EnterTitle { category };
    assert_eq!(outcome.reply.as_deref(), Some(messages::ENTER_TITLE));
    assert_eq!(outcome.next_state, Some(enter_title.clone()));

    let outcome = send(&tx, "   ", Some(enter_title.clone())).await?;
    assert_eq!(outcome.reply.as_deref(), Some(messages::INVALID_TITLE));
    assert_eq!(outcome.next_state, Some(enter_title.clone()));

    // Listing goals and unknown commands keep the dialog going.
    let outcome = send(&tx, "/goals", Some(enter_title.clone())).await?;
    assert_eq!(outcome.reply.as_deref(), Some(messages::NO_GOALS));
    assert_eq!(outcome.next_state, Some(enter_title.clone()));
    let outcome = send(&tx, "/start", Some(enter_title.clone())).await?;
    assert_eq!(outcome.reply.as_deref(), Some(messages::UNKNOWN_COMMAND));
    assert_eq!(outcome.next_state, Some(enter_title.clone()));

    let outcome = send(&tx, " Buy milk ", Some(enter_title.clone())).await?;
    let goals = Goal::list_by_author(&tx, &alice).await?;
    assert_eq!(goals.len(), 1);
    assert_eq!(goals[0].title, "Buy milk");
    assert_eq!(goals[0].category, category);
    assert_eq!(outcome.reply, Some(messages::goal_created(goals[0].id, "Buy milk")));
    assert_eq!(outcome.next_state, None);

    // The category vanishes in the middle of the dialog.
    Category::delete(&tx, category, &alice).await?;
    let outcome = send(&tx, "Buy bread", Some(enter_title.clone())).await?;
    assert_eq!(outcome.reply.as_deref(), Some(messages::CATEGORY_GONE));
    assert_eq!(outcome.next_state, None);
    assert_eq!(Goal::list_by_author(&tx, &alice).await?.len(), 0);

    let outcome = send(&tx, "/cancel", Some(enter_title)).await?;
    assert_eq!(outcome.reply.as_deref(), Some(messages::CANCELLED));
    assert_eq!(outcome.next_state, None);

    Ok(())
}
