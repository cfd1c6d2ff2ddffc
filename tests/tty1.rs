//! Scripts from the tty1.net Sieve tutorial
//! (http://www.tty1.net/blog/2011-07-16-sieve-tutorial_en.html).

use rstest::rstest;
use sieve_dom::{validate, Document};

const EXAMPLE_I: &str = concat!(
    "require [\"fileinto\", \"reject\"];\r\n",
    "\r\n",
    "# Daffy Duck is a good friend of mine.\r\n",
    "if address :is \"from\" \"daffy.duck@example.com\"\r\n",
    "{\r\n",
    "    fileinto \"friends\";\r\n",
    "}\r\n",
    "\r\n",
    "# Reject mails from the hunting enthusiasts at example.com.\r\n",
    "if header :contains \"list-id\" \"<duck-hunting.example.com>\"\r\n",
    "{\r\n",
    "    reject \"No violence, please\";\r\n",
    "}\r\n",
    "\r\n",
    "# The command \"keep\" is executed automatically, if no other action is taken.\r\n",
);

const EXAMPLE_II: &str = concat!(
    "# The hash character starts a one-line comment.\r\n",
    "# Everything after a # character until the end of line is ignored.\r\n",
    "\r\n",
    "/* this is a bracketed (C-style) comment. This type of comment can stretch\r\n",
    " * over many lines. A bracketed comment begins with a forward slash, followed\r\n",
    " * by an asterisk and ends with the inverse sequence: an asterisk followed\r\n",
    " * by a forward slash. */\r\n",
);

const EXAMPLE_III: &str = concat!(
    "require [\"fileinto\"];\r\n",
    "\r\n",
    "# The two test below are equivalent;\r\n",
    "# The first variant is clearer and probably also more efficient.\r\n",
    "if address :is :domain \"to\" \"example.com\"\r\n",
    "{\r\n",
    "    fileinto \"examplecom\";\r\n",
    "}\r\n",
    "if address :matches :all \"to\" \"*@example.com\"\r\n",
    "{\r\n",
    "    fileinto \"examplecom\";\r\n",
    "}\r\n",
);

const EXAMPLE_IV: &str = concat!(
    "require [\"fileinto\"];\r\n",
    "\r\n",
    "# File mails with a Spamassassin score of 4.0 or more\r\n",
    "# into the \"junk\" folder.\r\n",
    "if header :contains \"x-spam-level\" \"****\"\r\n",
    "{\r\n",
    "    fileinto \"junk\";\r\n",
    "}\r\n",
);

const EXAMPLE_V: &str = concat!(
    "require [\"reject\"];\r\n",
    "\r\n",
    "# Reject all messages that contain the string \"viagra\"in the Subject.\r\n",
    "if header :contains \"subject\" \"viagra\"\r\n",
    "{\r\n",
    "    reject \"go away!\";\r\n",
    "}\r\n",
    "# Silently discard all messages sent from the tax man\r\n",
    "elsif address :matches :domain \"from\" \"*hmrc.gov.uk\"\r\n",
    "{\r\n",
    "    discard;\r\n",
    "}\r\n",
);

const EXAMPLE_VI: &str = concat!(
    "require [\"fileinto\"];\r\n",
    "\r\n",
    "# A mail to any of the recipients in the list of strings is filed to the folder \"friends\".\r\n",
    "if address :is \"from\" [\"daffy.duck@example.com\", \"porky.pig@example.com\", \"speedy.gonzales@example.com\"]\r\n",
    "{\r\n",
    "    fileinto \"friends\";\r\n",
    "}\r\n",
);

const EXAMPLE_VII: &str = concat!(
    "require [\"fileinto\"];\r\n",
    "\r\n",
    "# Check if either the \"from\" or the \"sender\" header is from Porky.\r\n",
    "if address :is [\"from\", \"sender\"] \"porky.pig@example.com\"\r\n",
    "{\r\n",
    "    fileinto \"friends\";\r\n",
    "}\r\n",
);

const EXAMPLE_VIII: &str = concat!(
    "require [\"fileinto\"];\r\n",
    "\r\n",
    "# Match \"from\" or the \"sender\" file with any of Daffy, Porky or Speedy.\r\n",
    "if address :is [\"from\", \"sender\"] [\"daffy.duck@example.com\", \"porky.pig@example.com\", \"speedy.gonzales@example.com\"]\r\n",
    "{\r\n",
    "    fileinto \"friends\";\r\n",
    "}\r\n",
);

const EXAMPLE_IX: &str = concat!(
    "# This test checks against Spamassassin's header fields:\r\n",
    "# If the spam level ls 4 or more and the Subject contains too\r\n",
    "# many illegal characters, then silently discard the mail.\r\n",
    "if allof (header :contains \"X-Spam-Level\" \"****\",\r\n",
    "          header :contains \"X-Spam-Report\" \"FROM_ILLEGAL_CHARS\")\r\n",
    "{\r\n",
    "    discard;\r\n",
    "}\r\n",
    "# Discard mails that do not have a Date: or From: header field\r\n",
    "# or mails that are sent from the marketing department at example.com.\r\n",
    "elsif anyof (not exists [\"from\", \"date\"],\r\n",
    "        header :contains \"from\" \"marketing@example.com\") {\r\n",
    "    discard;\r\n",
    "}\r\n",
);

const EXAMPLE_X: &str = concat!(
    "# Delete messages greater than half a MB\r\n",
    "if size :over 500K\r\n",
    "{\r\n",
    "    discard;\r\n",
    "}\r\n",
    "# Also delete small mails, under 1k\r\n",
    "if size :under 1K\r\n",
    "{\r\n",
    "    discard;\r\n",
    "}\r\n",
);

#[rstest]
#[case::example_i(EXAMPLE_I, &["fileinto", "reject"])]
#[case::example_ii(EXAMPLE_II, &[])]
#[case::example_iii(EXAMPLE_III, &["fileinto"])]
#[case::example_iv(EXAMPLE_IV, &["fileinto"])]
#[case::example_v(EXAMPLE_V, &["reject"])]
#[case::example_vi(EXAMPLE_VI, &["fileinto"])]
#[case::example_vii(EXAMPLE_VII, &["fileinto"])]
#[case::example_viii(EXAMPLE_VIII, &["fileinto"])]
#[case::example_ix(EXAMPLE_IX, &[])]
#[case::example_x(EXAMPLE_X, &[])]
fn test_tty1_example(#[case] script: &str, #[case] expected: &[&str]) {
    validate(script, expected).unwrap();

    let doc = Document::parse(script).unwrap();
    assert_eq!(doc.to_script(), script);
    assert!(doc.check_capabilities().is_empty());
}

#[rstest]
#[case::example_i(EXAMPLE_I)]
#[case::example_v(EXAMPLE_V)]
#[case::example_ix(EXAMPLE_IX)]
fn test_tty1_round_trip_with_lf(#[case] script: &str) {
    let lf = script.replace("\r\n", "\n");
    let doc = Document::parse(&lf).unwrap();
    assert_eq!(doc.to_script(), lf);
}

#[test]
fn test_wrong_expectation_is_reported() {
    let err = validate(EXAMPLE_IV, &["reject"]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "script requires [\"fileinto\"], expected [\"reject\"]"
    );
}
