use beancount_import::compose::{ComposePrompts, Edit, PostingRequest};
use beancount_import::console::BufferConsole;
use beancount_import::import::ofx;
use beancount_import::session::{self, Resolution, SessionConfig, SessionPrompts};
use beancount_import::{Decimal, ImportedTransaction, Ledger, LedgerEntry, PostingInput};
use std::collections::VecDeque;
use std::path::PathBuf;

const LEDGER: &str = r#"option "operating_currency" "USD"

2024-01-01 open Assets:Checking
2024-01-01 open Expenses:Food

2024-01-05 * "Coffee Shop"
  Assets:Checking  -42.00 USD
  Expenses:Food     42.00 USD

2024-01-08 * "Bakery"
  Assets:Checking  -7.25 USD
  Expenses:Food ; paid in cash

2024-01-09 * "Already done"
  Assets:Checking  -3.00 USD
    rec: "t3"
  Expenses:Food
"#;

const OFX: &str = "\
<OFX><BANKMSGSRSV1><STMTTRNRS><STMTRS>
<BANKACCTFROM><ACCTID>000123456<ACCTTYPE>CHECKING</BANKACCTFROM>
<BANKTRANLIST>
<STMTTRN><DTPOSTED>20240107<TRNAMT>-12.50<FITID>t2<NAME>GROCER #42</STMTTRN>
<STMTTRN><DTPOSTED>20240105<TRNAMT>-42.00<FITID>t1<NAME>COFFEE</STMTTRN>
<STMTTRN><DTPOSTED>20240109<TRNAMT>-3.00<FITID>t3<NAME>DONE</STMTTRN>
<STMTTRN><DTPOSTED>20240108<TRNAMT>-7.25<FITID>t4<NAME>BAKERY</STMTTRN>
</BANKTRANLIST></STMTRS></STMTTRNRS></BANKMSGSRSV1></OFX>
";

#[derive(Default)]
struct Script {
    resolutions: VecDeque<Resolution>,
    choices: VecDeque<Option<usize>>,
    confirms: VecDeque<bool>,
    payees: VecDeque<Option<String>>,
    totals: VecDeque<Option<Decimal>>,
    postings: VecDeque<Option<PostingInput>>,
    edits: VecDeque<Option<Edit>>,
    asked: Vec<String>,
}

impl ComposePrompts for Script {
    fn total(&mut self, default: Decimal) -> Option<Decimal> {
        self.asked.push(format!("total {default}"));
        self.totals.pop_front().expect("unexpected total prompt")
    }

    fn posting(&mut self, request: &PostingRequest) -> Option<PostingInput> {
        self.asked.push(format!(
            "{} {} {}",
            request.side.label(),
            request.default_amount,
            request.default_account.as_deref().unwrap_or("-")
        ));
        self.postings.pop_front().expect("unexpected posting prompt")
    }

    fn edit(&mut self, _entry: &LedgerEntry) -> Option<Edit> {
        self.edits.pop_front().expect("unexpected edit prompt")
    }
}

impl SessionPrompts for Script {
    fn account(&mut self, _accounts: &[String]) -> Option<String> {
        panic!("account is configured")
    }

    fn choose(&mut self, question: &str, _count: usize) -> Option<usize> {
        self.asked.push(question.to_string());
        self.choices.pop_front().expect("unexpected choice")
    }

    fn resolve(&mut self, txn: &ImportedTransaction) -> Resolution {
        self.asked.push(format!("resolve {}", txn.id));
        self.resolutions.pop_front().expect("unexpected resolution")
    }

    fn confirm(&mut self, question: &str, _default: bool) -> bool {
        self.asked.push(question.to_string());
        self.confirms.pop_front().expect("unexpected confirmation")
    }

    fn payee(&mut self, raw: &str, _known: &[String]) -> Option<String> {
        self.asked.push(format!("payee {raw}"));
        self.payees.pop_front().expect("unexpected payee prompt")
    }
}

fn posting(account: &str, amount: &str) -> Option<PostingInput> {
    Some(PostingInput {
        account: account.to_string(),
        amount: amount.parse().unwrap(),
        currency: "USD".to_string(),
    })
}

fn setup(name: &str) -> (PathBuf, SessionConfig) {
    let dir = std::env::temp_dir().join(format!("bean-import-{}-{name}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let ledger = dir.join("main.beancount");
    std::fs::write(&ledger, LEDGER).unwrap();

    let mut config = SessionConfig::new(&ledger);
    config.account = Some("Assets:Checking".to_string());
    config.operating_currency = true;
    config.payees = dir.join("payees.json");
    config.output = Some(dir.join("out.beancount"));
    let _ = std::fs::remove_file(dir.join("payees.json"));
    let _ = std::fs::remove_file(dir.join("out.beancount"));
    (dir, config)
}

#[test]
fn reconcile_insert_and_skip() {
    let (dir, config) = setup("full");
    let batch = ofx::parse(OFX).unwrap();

    let mut script = Script {
        resolutions: [
            Resolution::Reconcile,
            Resolution::Insert,
            Resolution::Reconcile,
        ]
        .into(),
        choices: [Some(0), Some(0)].into(),
        payees: [Some("Grocer".to_string())].into(),
        totals: [None].into(),
        postings: [
            posting("Expenses:Food", "12.50"),
            posting("Assets:Checking", "-12.50"),
        ]
        .into(),
        edits: [Some(Edit::Save)].into(),
        ..Script::default()
    };
    let mut console = BufferConsole::default();

    let summary = session::run(&config, vec![batch], &mut script, &mut console).unwrap();
    assert_eq!(
        (summary.reconciled, summary.inserted, summary.skipped),
        (2, 1, 0)
    );
    assert!(!summary.ended_early);
    assert!(summary.buffer.is_empty());

    // pending transactions come oldest first, t3 is already reconciled
    assert_eq!(
        script.asked,
        [
            "resolve t1",
            "Select match [0]",
            "resolve t2",
            "payee GROCER #42",
            "total 12.50",
            "Credit 12.50 -",
            "Debit -12.50 Assets:Checking",
            "resolve t4",
            "Select match [0]",
        ]
    );

    // the clean entry is re-rendered, the commented one only gains a line
    let ledger = std::fs::read_to_string(&config.ledger).unwrap();
    insta::assert_snapshot!(ledger, @r#"
    option "operating_currency" "USD"

    2024-01-01 open Assets:Checking
    2024-01-01 open Expenses:Food

    2024-01-05 * "Coffee Shop"
      Assets:Checking  -42.00 USD
        rec: "t1"
      Expenses:Food     42.00 USD

    2024-01-08 * "Bakery"
      Assets:Checking  -7.25 USD
        rec: "t4"
      Expenses:Food ; paid in cash

    2024-01-09 * "Already done"
      Assets:Checking  -3.00 USD
        rec: "t3"
      Expenses:Food
    "#);

    let output = std::fs::read_to_string(config.output.as_ref().unwrap()).unwrap();
    assert!(output.starts_with('\n'));
    insta::assert_snapshot!(output.trim_start(), @r#"
    2024-01-07 * "Grocer" ""
      Expenses:Food     12.50 USD
      Assets:Checking  -12.50 USD
        rec: "t2"
    "#);

    let payees = std::fs::read_to_string(&config.payees).unwrap();
    assert!(payees.contains(r#""GROCER #42": "Grocer""#));

    // t2 went to the output file, so only it is still pending in the ledger
    let reloaded = Ledger::load(&config.ledger).unwrap();
    assert_eq!(reloaded.errors, Vec::<String>::new());
    let mut script = Script {
        resolutions: [Resolution::Quit].into(),
        ..Script::default()
    };
    let mut console = BufferConsole::default();
    let summary = session::run(
        &config,
        vec![ofx::parse(OFX).unwrap()],
        &mut script,
        &mut console,
    )
    .unwrap();
    assert_eq!(script.asked, ["resolve t2"]);
    assert_eq!(summary.skipped, 1);
    assert!(console.contents().contains("Found 1 transactions not in LEDGER"));

    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn no_match_falls_back_and_quit_stops() {
    let (dir, mut config) = setup("fallback");
    config.output = None;
    let batch = ofx::parse(OFX).unwrap();

    let mut script = Script {
        resolutions: [Resolution::Reconcile, Resolution::Skip, Resolution::Quit].into(),
        // nothing posts to this account, so the insert offer is declined
        confirms: [false].into(),
        ..Script::default()
    };
    config.account = Some("Assets:Savings".to_string());
    let mut console = BufferConsole::default();

    let summary = session::run(&config, vec![batch], &mut script, &mut console).unwrap();
    assert_eq!(
        (summary.reconciled, summary.inserted, summary.skipped),
        (0, 0, 3)
    );
    assert_eq!(
        script.asked[..2],
        [
            "resolve t1",
            "...No matching transactions found. Would you like to insert instead?"
        ]
    );
    assert_eq!(std::fs::read_to_string(&config.ledger).unwrap(), LEDGER);
    assert!(console.contents().contains("Skipped 3 transactions"));

    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn failed_append_counts_as_skipped() {
    let (dir, mut config) = setup("append");
    config.output = Some(dir.join("missing").join("out.beancount"));
    config.period = Some("2024-01-07".parse().unwrap());

    let mut script = Script {
        resolutions: [Resolution::Insert].into(),
        payees: [None].into(),
        totals: [Some("12.50".parse().unwrap())].into(),
        postings: [posting("Expenses:Food", "12.50"), None].into(),
        edits: [Some(Edit::Save)].into(),
        confirms: [true].into(),
        ..Script::default()
    };
    let mut console = BufferConsole::default();

    let summary = session::run(
        &config,
        vec![ofx::parse(OFX).unwrap()],
        &mut script,
        &mut console,
    )
    .unwrap();
    assert_eq!((summary.inserted, summary.skipped), (0, 1));
    let contents = console.contents();
    assert!(contents.contains("Found 1 transactions within period 2024-01-07"));
    assert!(contents.contains("failed to access"));
    // the debit was cancelled, so nothing posts to the target account
    assert_eq!(
        script.asked.last().map(String::as_str),
        Some("...Transaction account Assets:Checking not found, continue anyways?")
    );

    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn reconcile_tags_the_matched_posting() {
    let (dir, mut config) = setup("split-posting");
    std::fs::write(
        &config.ledger,
        r#"2024-01-05 * "Transfer"
  Assets:Checking  -5.00 USD
    rec: "t0"
  Assets:Checking  -10.00 USD
  Expenses:Food
"#,
    )
    .unwrap();
    config.output = None;
    let statement = "<OFX><STMTTRN><DTPOSTED>20240105<TRNAMT>-10.00<FITID>t1<NAME>TRANSFER</STMTTRN></OFX>";

    let mut script = Script {
        resolutions: [Resolution::Reconcile].into(),
        choices: [Some(0)].into(),
        ..Script::default()
    };
    let mut console = BufferConsole::default();
    let summary = session::run(
        &config,
        vec![ofx::parse(statement).unwrap()],
        &mut script,
        &mut console,
    )
    .unwrap();
    assert_eq!(summary.reconciled, 1);

    let ledger = Ledger::load(&config.ledger).unwrap();
    let postings = ledger.entries[0].postings();
    assert_eq!(postings[0].meta_string("rec"), Some("t0"));
    assert_eq!(postings[1].meta_string("rec"), Some("t1"));

    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn empty_inputs_end_early() {
    let (dir, config) = setup("empty");
    let mut console = BufferConsole::default();

    let summary = session::run(&config, Vec::new(), &mut Script::default(), &mut console).unwrap();
    assert!(summary.ended_early);
    assert!(console.contents().contains("No transactions found"));

    let mut config = config;
    config.period = Some("2023".parse().unwrap());
    let summary = session::run(
        &config,
        vec![ofx::parse(OFX).unwrap()],
        &mut Script::default(),
        &mut console,
    )
    .unwrap();
    assert!(summary.ended_early);
    assert!(console.contents().contains("within the specified period 2023"));

    std::fs::remove_dir_all(dir).unwrap();
}
