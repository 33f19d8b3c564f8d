//! XML 负载映射
//!
//! 先用 quick-xml 的事件流构建一棵轻量元素树，再按固定路径取值：
//!
//! ```xml
//! <Order>
//!   <Header><Id>A1</Id><Type>digital</Type><Location>S1</Location></Header>
//!   <Details><Item>SKU-1</Item><Quantity>2</Quantity></Details>
//! </Order>
//! ```
//!
//! 根元素名称不参与匹配。`Details` 下的子元素转换规则：
//! 叶子元素取文本；带子元素或属性的元素转为 map；同名兄弟元素合并为列表；
//! 复合元素自身的文本以空字符串为键保留在 map 中。
//! XML 没有类型信息，所有叶子值都按字符串保存。

use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use order_shared::error::{OrderError, Result};
use order_shared::orders::{CanonicalOrder, DetailValue, OrderDetails};

use super::{PayloadFormat, malformed};

pub(super) fn normalize(raw_payload: &str) -> Result<CanonicalOrder> {
    let root = parse_document(raw_payload)?;
    let header = root.child("Header");

    let header_text = |name: &str| header.map(|h| h.child_text(name)).unwrap_or_default();

    Ok(CanonicalOrder {
        order_id: header_text("Id"),
        order_type: header_text("Type"),
        store_id: header_text("Location"),
        details: root
            .child("Details")
            .map(XmlElement::fields)
            .unwrap_or_default(),
    })
}

#[derive(Debug, Default)]
struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlElement>,
    text: String,
}

impl XmlElement {
    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let mut attributes = Vec::new();

        for attribute in start.attributes() {
            let attribute = attribute.map_err(xml_error)?;
            // 命名空间声明不是业务数据
            if attribute.key.as_namespace_binding().is_some() {
                continue;
            }
            let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
            let value = attribute.unescape_value().map_err(xml_error)?.into_owned();
            attributes.push((key, value));
        }

        Ok(Self {
            name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            attributes,
            ..Default::default()
        })
    }

    fn is_leaf(&self) -> bool {
        self.children.is_empty() && self.attributes.is_empty()
    }

    fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// 子元素的文本；子元素缺失或本身是复合元素时返回空字符串
    fn child_text(&self, name: &str) -> String {
        match self.child(name) {
            Some(child) if child.children.is_empty() => child.text.clone(),
            _ => String::new(),
        }
    }

    /// 属性与子元素展开为 map，同名子元素合并为列表，
    /// 与属性或子元素并存的文本放在空字符串键下
    fn fields(&self) -> OrderDetails {
        let mut grouped: BTreeMap<String, Vec<DetailValue>> = BTreeMap::new();
        for child in &self.children {
            grouped
                .entry(child.name.clone())
                .or_default()
                .push(child.to_value());
        }

        let mut fields: OrderDetails = self
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), DetailValue::String(v.clone())))
            .collect();

        for (name, mut values) in grouped {
            let value = if values.len() == 1 {
                values.remove(0)
            } else {
                DetailValue::List(values)
            };
            fields.insert(name, value);
        }

        if !self.text.is_empty() {
            fields.insert(String::new(), DetailValue::String(self.text.clone()));
        }

        fields
    }

    fn to_value(&self) -> DetailValue {
        if self.is_leaf() {
            DetailValue::String(self.text.clone())
        } else {
            DetailValue::Map(self.fields())
        }
    }
}

fn parse_document(raw_payload: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(raw_payload);
    reader.config_mut().trim_text(true);

    let mut open: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(start) => open.push(XmlElement::from_start(&start)?),
            Event::Empty(start) => {
                let element = XmlElement::from_start(&start)?;
                attach(&mut open, &mut root, element)?;
            }
            Event::End(_) => {
                let element = open
                    .pop()
                    .ok_or_else(|| malformed(PayloadFormat::Xml, "多余的结束标签"))?;
                attach(&mut open, &mut root, element)?;
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(xml_error)?;
                append_text(&mut open, &text)?;
            }
            Event::CData(data) => {
                let text = String::from_utf8_lossy(&data).into_owned();
                append_text(&mut open, &text)?;
            }
            Event::Eof => break,
            // 声明、注释、处理指令、DOCTYPE
            _ => {}
        }
    }

    if let Some(unclosed) = open.last() {
        return Err(malformed(
            PayloadFormat::Xml,
            format!("元素未闭合: <{}>", unclosed.name),
        ));
    }

    root.ok_or_else(|| malformed(PayloadFormat::Xml, "文档缺少根元素"))
}

fn attach(
    open: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<()> {
    match open.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_some() => {
            return Err(malformed(PayloadFormat::Xml, "文档存在多个根元素"));
        }
        None => *root = Some(element),
    }
    Ok(())
}

fn append_text(open: &mut [XmlElement], text: &str) -> Result<()> {
    match open.last_mut() {
        Some(current) => {
            current.text.push_str(text);
            Ok(())
        }
        None => Err(malformed(PayloadFormat::Xml, "根元素之外出现文本")),
    }
}

fn xml_error(e: impl std::fmt::Display) -> OrderError {
    malformed(PayloadFormat::Xml, e)
}
