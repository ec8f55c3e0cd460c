/// Naming rules: single source of truth for the advisor prompt.
pub const SCRIPT_RULES: &str = "\
1. 苗字がカタカナの場合、下の名前もカタカナにする。\n\
2. 苗字が漢字の場合、基本は漢字にする。願いに「アメリカ人風」などの指定があればカタカナも可。\n\
3. 苗字がない場合やファンタジーの世界観の場合、世界観に合わせて文字種を自由に選ぶ。\n\
4. 出力する名前に苗字を含めない。下の名前のみを書く。\n\
5. 「避けたい漢字」に挙げられた文字は使わない。「使いたい漢字」はできる限り取り入れる。";

/// Scoring rubric. Each category is scored out of 100.
pub const SCORING_RUBRIC: &str = "\
1. 【響き】呼んだ時のリズム。苗字がある場合は苗字とつなげた時の語呂で採点する。\n\
2. 【字形】文字の並びの美しさ。\n\
3. 【独創】ユニークさ、他と被りにくいか。\n\
4. 【可読】誰でも正しく読めるか。\n\
5. 【願い】ユーザーの願いと合致しているか。";

/// Markup restriction. Emphasis markers break label matching downstream.
pub const PLAIN_TEXT_RULE: &str =
    "「**」などの太字記号や「###」などの見出し記号は一切使わず、普通のテキストだけで出力する。";
