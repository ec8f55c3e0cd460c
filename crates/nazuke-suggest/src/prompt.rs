use nazuke_core::{rules, NamingRequest, ResponseFormat, ScoreCategory};

use crate::parse::DELIMITER;

/// Reply template for the delimited format. Labels here must stay in sync
/// with what `parse` looks for.
fn delimited_template() -> String {
    let mut out = String::with_capacity(256);
    out.push_str(DELIMITER);
    out.push_str("\n名前：〇〇（ヨミ）\n[内訳]\n");
    for (cat, example) in ScoreCategory::ALL.into_iter().zip([80, 90, 95, 60, 100]) {
        out.push('・');
        out.push_str(cat.label());
        out.push('：');
        out.push_str(&example.to_string());
        out.push_str("点\n");
    }
    out.push_str("\n理由：〜〜〜\n");
    out.push_str(DELIMITER);
    out
}

fn json_template() -> String {
    let scores: Vec<String> = ScoreCategory::ALL
        .into_iter()
        .map(|cat| format!("\"{}\":<0-100>", cat.romaji()))
        .collect();
    format!(
        "{{\"names\":[{{\"name\":\"<名前>\",\"yomi\":\"<ヨミ>\",\"scores\":{{{}}},\"total\":<0-100>,\"reason\":\"<理由>\"}}]}}",
        scores.join(",")
    )
}

pub fn system_prompt(format: ResponseFormat) -> String {
    let output = match format {
        ResponseFormat::DelimitedText => format!(
            "候補ごとに次の形式で出力し、候補の前後を「{DELIMITER}」で区切ってください。\n\n{}",
            delimited_template()
        ),
        ResponseFormat::StructuredJson => format!(
            "次の形式のJSONだけを出力してください。JSON以外の文章は書かないでください。\n\n{}",
            json_template()
        ),
    };

    format!(
        "あなたはプロの命名アドバイザーです。ユーザーの条件に基づいて名前を提案し、\
各候補を採点してください。\n\n\
## 文字種の判断基準\n{}\n\n\
## 評価システム（各100点満点）\n{}\n\n\
## 表記\n{}\n\n\
## 出力形式\n{}",
        rules::SCRIPT_RULES,
        rules::SCORING_RUBRIC,
        rules::PLAIN_TEXT_RULE,
        output
    )
}

fn surname_instruction(request: &NamingRequest) -> String {
    match request.surname() {
        Some(surname) => format!(
            "苗字は「{surname}」です。この苗字とつなげた時の響きが良い名前を考えてください。\
「響き」はこの苗字とつなげた時のリズムで採点してください。"
        ),
        None => "苗字は入力されていないため、下の名前のみを提案してください。".to_string(),
    }
}

fn or_none(value: &str) -> &str {
    let value = value.trim();
    if value.is_empty() {
        "なし"
    } else {
        value
    }
}

pub fn user_message(request: &NamingRequest) -> String {
    let mut out = String::with_capacity(512);
    out.push_str(&format!(
        "最適な名前を{}つ提案してください。\n\n",
        request.count
    ));
    out.push_str("【苗字の扱い】\n");
    out.push_str(&surname_instruction(request));
    out.push_str("\n\n【条件】\n");
    out.push_str(&format!("・対象：{}\n", request.target.label()));
    out.push_str(&format!("・性別：{}\n", request.gender.label()));
    out.push_str(&format!("・使いたい漢字：{}\n", or_none(&request.use_kanji)));
    out.push_str(&format!("・避けたい漢字：{}\n", or_none(&request.avoid_kanji)));
    out.push_str(&format!("・願い：{}\n", request.wish.trim()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::extract;
    use nazuke_core::{Gender, TargetType};

    #[test]
    fn delimited_template_parses_as_one_candidate() {
        let out = extract(&delimited_template(), ResponseFormat::DelimitedText);
        assert_eq!(out.candidates.len(), 1);
        let scores = out.candidates[0].scores;
        assert_eq!(scores.sound, 80);
        assert_eq!(scores.intent, 100);
    }

    #[test]
    fn json_template_names_every_category() {
        let template = json_template();
        for cat in ScoreCategory::ALL {
            assert!(template.contains(cat.romaji()));
        }
        assert!(template.starts_with("{\"names\":["));
    }

    #[test]
    fn system_prompt_switches_on_format() {
        assert!(system_prompt(ResponseFormat::DelimitedText).contains("名前：〇〇"));
        assert!(system_prompt(ResponseFormat::StructuredJson).contains("\"yomi\""));
    }

    #[test]
    fn user_message_carries_conditions() {
        let mut req = NamingRequest::new("優しくて芯の強い子に");
        req.target = TargetType::Pet;
        req.gender = Gender::Female;
        req.surname = Some("佐藤".into());
        req.use_kanji = "翔".into();

        let msg = user_message(&req);
        assert!(msg.contains("3つ"));
        assert!(msg.contains("「佐藤」"));
        assert!(msg.contains("・対象：ペット"));
        assert!(msg.contains("・性別：女"));
        assert!(msg.contains("・使いたい漢字：翔"));
        assert!(msg.contains("・避けたい漢字：なし"));
        assert!(msg.contains("優しくて芯の強い子に"));
    }

    #[test]
    fn missing_surname_asks_for_given_name_only() {
        let msg = user_message(&NamingRequest::new("wish"));
        assert!(msg.contains("下の名前のみ"));
    }
}
